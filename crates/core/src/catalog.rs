use crate::error::CurationError;
use crate::models::{ChunkId, DisplayHint, DocumentId, PageId, PageRef};
use crate::traits::PageCatalog;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashSet;
use std::path::Path;

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
    pub id: PageId,
    pub page_num: u32,
    #[serde(default)]
    pub chunk_ids: Vec<ChunkId>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
}

/// A document together with its pages, as the backend lists them.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentWithPages {
    pub document_id: DocumentId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub pages: Vec<CatalogPage>,
}

#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    document_id: DocumentId,
    title: String,
    pages: Vec<PageRef>,
    hints: Vec<Option<DisplayHint>>,
}

impl InMemoryCatalog {
    pub fn from_document(document: DocumentWithPages) -> Result<Self, CurationError> {
        let mut seen = HashSet::new();
        let mut pages = document.pages;
        pages.sort_by_key(|page| page.page_num);

        for page in &pages {
            if !seen.insert(page.id) {
                return Err(CurationError::DuplicatePage(page.id));
            }
        }

        let title = document
            .title
            .filter(|title| !title.trim().is_empty())
            .or(document.filename)
            .unwrap_or_else(|| format!("document {}", document.document_id));

        let hints = pages
            .iter()
            .map(|page| {
                page.thumbnail.clone().map(|thumbnail| DisplayHint {
                    thumbnail,
                    mimetype: page.mimetype.clone(),
                })
            })
            .collect();

        let pages = pages
            .into_iter()
            .map(|page| PageRef {
                page_id: page.id,
                document_id: document.document_id,
                page_number: page.page_num,
                chunk_ids: page.chunk_ids,
            })
            .collect();

        Ok(Self {
            document_id: document.document_id,
            title,
            pages,
            hints,
        })
    }

    /// Builds a catalog straight from page refs; every page must belong to
    /// `document_id`.
    pub fn from_pages(
        document_id: DocumentId,
        title: impl Into<String>,
        pages: Vec<PageRef>,
    ) -> Result<Self, CurationError> {
        if let Some(stray) = pages.iter().find(|page| page.document_id != document_id) {
            return Err(CurationError::UnknownDocument {
                expected: document_id,
                found: stray.document_id,
            });
        }

        let document = DocumentWithPages {
            document_id,
            title: Some(title.into()),
            filename: None,
            pages: pages
                .into_iter()
                .map(|page| CatalogPage {
                    id: page.page_id,
                    page_num: page.page_number,
                    chunk_ids: page.chunk_ids,
                    thumbnail: None,
                    mimetype: None,
                })
                .collect(),
        };
        Self::from_document(document)
    }

    pub fn load_json(path: &Path) -> Result<Self, CurationError> {
        let raw = std::fs::read_to_string(path)?;
        let document: DocumentWithPages = serde_json::from_str(&raw)?;
        Self::from_document(document)
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }
}

impl PageCatalog for InMemoryCatalog {
    fn current_pages(&self) -> &[PageRef] {
        &self.pages
    }

    fn document_title(&self) -> String {
        self.title.clone()
    }

    fn thumbnail_for(&self, page_id: PageId) -> Option<DisplayHint> {
        let index = self.pages.iter().position(|page| page.page_id == page_id)?;
        self.hints.get(index).cloned().flatten()
    }
}
