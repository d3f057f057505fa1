use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::error::CurationError;

pub type PageId = i64;
pub type ChunkId = i64;
pub type DocumentId = i64;

/// Grade assumed for a chunk that has never been scored.
pub const DEFAULT_SCORE: i32 = 1;

fn default_score() -> i32 {
    DEFAULT_SCORE
}

/// A page as the catalog describes it. The engine keeps its own copy once the
/// page becomes evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRef {
    pub page_id: PageId,
    pub document_id: DocumentId,
    /// 1-based position within the owning document.
    pub page_number: u32,
    pub chunk_ids: Vec<ChunkId>,
}

impl PageRef {
    pub fn owns_chunk(&self, chunk_id: ChunkId) -> bool {
        self.chunk_ids.contains(&chunk_id)
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayHint {
    pub thumbnail: String,
    pub mimetype: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceItem {
    pub page: PageRef,
    pub document_title: String,
    pub display_hint: Option<DisplayHint>,
}

impl EvidenceItem {
    pub fn page_id(&self) -> PageId {
        self.page.page_id
    }
}

/// Relevance labels offered to annotators. The engine itself stores raw
/// integers; this type is for the layer that validates user input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum RelevanceGrade {
    NotRelevant,
    #[default]
    SomewhatRelevant,
    HighlyRelevant,
}

impl RelevanceGrade {
    pub fn score(self) -> i32 {
        match self {
            Self::NotRelevant => 0,
            Self::SomewhatRelevant => 1,
            Self::HighlyRelevant => 2,
        }
    }
}

impl TryFrom<i32> for RelevanceGrade {
    type Error = CurationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NotRelevant),
            1 => Ok(Self::SomewhatRelevant),
            2 => Ok(Self::HighlyRelevant),
            other => Err(CurationError::InvalidGrade(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScoredChunk {
    pub chunk_id: ChunkId,
    pub score: i32,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedItem {
    pub page_id: PageId,
    pub chunk_id: ChunkId,
    #[serde(default = "default_score")]
    pub score: i32,
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedGroup {
    #[serde(default)]
    pub items: Vec<PersistedItem>,
}

/// One row of the retrieval_relation table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalRelation {
    pub query_id: i64,
    pub group_index: i32,
    pub group_order: i32,
    pub chunk_id: ChunkId,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceWithScore {
    pub chunk_id: ChunkId,
    pub score: i32,
}

impl From<ScoredChunk> for EvidenceWithScore {
    fn from(value: ScoredChunk) -> Self {
        Self {
            chunk_id: value.chunk_id,
            score: value.score,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    #[serde(default)]
    pub id: Option<i64>,
    pub contents: String,
    #[serde(default)]
    pub query_to_llm: Option<String>,
    #[serde(default)]
    pub generation_gt: Option<Vec<String>>,
}

/// A stored annotation: the question plus its grouped evidence.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryWithEvidence {
    pub query: Query,
    #[serde(default)]
    pub evidence_groups: Vec<PersistedGroup>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateQueryRequest {
    pub contents: String,
    pub query_to_llm: Option<String>,
    pub generation_gt: Option<Vec<String>>,
    /// Each inner list is one group; groups are ANDed, items inside a group are ORed.
    pub evidence_groups: Vec<Vec<EvidenceWithScore>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_conversion_rejects_out_of_range_values() {
        assert_eq!(
            RelevanceGrade::try_from(2).expect("2 is a valid grade"),
            RelevanceGrade::HighlyRelevant
        );
        assert!(matches!(
            RelevanceGrade::try_from(3),
            Err(CurationError::InvalidGrade(3))
        ));
        assert!(RelevanceGrade::try_from(-1).is_err());
        assert_eq!(RelevanceGrade::default().score(), DEFAULT_SCORE);
    }

    #[test]
    fn persisted_item_without_score_defaults_to_one() {
        let item: PersistedItem =
            serde_json::from_str(r#"{"page_id": 4, "chunk_id": 40}"#).expect("item should parse");
        assert_eq!(item.score, DEFAULT_SCORE);
        assert_eq!(item.document_id, None);
    }

    #[test]
    fn persisted_item_skips_missing_location_fields() {
        let item = PersistedItem {
            page_id: 1,
            chunk_id: 10,
            score: 2,
            document_id: None,
            page_number: None,
        };
        let json = serde_json::to_string(&item).expect("item should serialize");
        assert_eq!(json, r#"{"page_id":1,"chunk_id":10,"score":2}"#);
    }
}
