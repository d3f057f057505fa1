use crate::error::CurationError;
use crate::evidence::EvidenceEngine;
use crate::focus::FocusTracker;
use crate::models::{CreateQueryRequest, EvidenceWithScore, Query, QueryWithEvidence};
use crate::traits::PageCatalog;
use chrono::Utc;

/// Everything being edited for one question: the draft text, the browsing
/// focus and the evidence.
#[derive(Debug, Default)]
pub struct AnnotationSession {
    pub query: Query,
    pub focus: FocusTracker,
    pub evidence: EvidenceEngine,
}

impl AnnotationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, record: &QueryWithEvidence, catalog: &impl PageCatalog) {
        self.query = record.query.clone();
        self.evidence
            .restore_from_persisted(&record.evidence_groups, catalog);
    }

    pub fn to_create_request(&self) -> Result<CreateQueryRequest, CurationError> {
        let contents = self.query.contents.trim();
        if contents.is_empty() {
            return Err(CurationError::InvalidArgument(
                "query contents are empty".to_string(),
            ));
        }

        let evidence_groups: Vec<Vec<EvidenceWithScore>> = self
            .evidence
            .evidence_groups()
            .into_iter()
            .map(|group| group.into_iter().map(EvidenceWithScore::from).collect())
            .collect();
        if evidence_groups.is_empty() {
            return Err(CurationError::InvalidArgument(
                "query has no evidence chunks".to_string(),
            ));
        }

        Ok(CreateQueryRequest {
            contents: contents.to_string(),
            query_to_llm: self.query.query_to_llm.clone(),
            generation_gt: self.query.generation_gt.clone(),
            evidence_groups,
        })
    }

    pub fn to_record(&self) -> QueryWithEvidence {
        QueryWithEvidence {
            query: self.query.clone(),
            evidence_groups: self.evidence.persisted_groups(),
            saved_at: Some(Utc::now()),
        }
    }

    /// Starts a fresh draft. Focus is left where it is.
    pub fn reset(&mut self) {
        self.query = Query::default();
        self.evidence.clear_evidence();
    }
}
