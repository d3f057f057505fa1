pub mod catalog;
pub mod error;
pub mod evidence;
pub mod focus;
pub mod grouping;
pub mod models;
pub mod restore;
pub mod session;
pub mod traits;

pub use catalog::{CatalogPage, DocumentWithPages, InMemoryCatalog};
pub use error::{CurationError, Result};
pub use evidence::{EvidenceEngine, EvidenceUpdate};
pub use focus::{Direction, FocusTracker};
pub use grouping::{Group, Grouping, GroupingMode};
pub use models::{
    ChunkId, CreateQueryRequest, DisplayHint, DocumentId, EvidenceItem, EvidenceWithScore,
    PageId, PageRef, PersistedGroup, PersistedItem, Query, QueryWithEvidence, RelevanceGrade,
    RetrievalRelation, ScoredChunk, DEFAULT_SCORE,
};
pub use session::AnnotationSession;
pub use traits::PageCatalog;
