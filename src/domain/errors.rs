use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("No documents found: {0}")]
    NoDocumentsFound(String),

    #[error("Unsupported source type: {0}")]
    UnsupportedSourceType(String),

    #[error("Index corrupt or missing: {0}")]
    IndexCorruptOrMissing(String),

    #[error("Upstream model error: {0}")]
    UpstreamModel(String),

    #[error("Assistant is not initialized")]
    NotReady,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn no_documents(msg: impl Into<String>) -> Self {
        Self::NoDocumentsFound(msg.into())
    }

    pub fn unsupported_source(msg: impl Into<String>) -> Self {
        Self::UnsupportedSourceType(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexCorruptOrMissing(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamModel(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
