use async_trait::async_trait;
use std::path::Path;

use crate::domain::{errors::DomainError, Document, SourceType};

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Reads every document of `source_type` under `folder`. An empty
    /// folder yields an empty vector; a missing folder is an error.
    async fn load(&self, folder: &Path, source_type: SourceType)
        -> Result<Vec<Document>, DomainError>;
}
