use crate::models::{DocumentId, PageId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CurationError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("relevance grade out of range: {0} (expected 0, 1 or 2)")]
    InvalidGrade(i32),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("duplicate page id in catalog: {0}")]
    DuplicatePage(PageId),

    #[error("page belongs to document {found}, catalog holds document {expected}")]
    UnknownDocument { expected: DocumentId, found: DocumentId },
}

pub type Result<T, E = CurationError> = std::result::Result<T, E>;
