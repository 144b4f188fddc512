use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};
use walkdir::WalkDir;

use crate::domain::{
    ports::DocumentLoader, Document, DocumentMetadata, DomainError, Result, SourceType,
};

/// Reads PDF pages or Markdown files from a local folder tree.
#[derive(Debug, Clone, Default)]
pub struct FsDocumentLoader;

impl FsDocumentLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for FsDocumentLoader {
    #[instrument(skip(self), fields(folder = %folder.display()))]
    async fn load(&self, folder: &Path, source_type: SourceType) -> Result<Vec<Document>> {
        let folder = folder.to_path_buf();
        tokio::task::spawn_blocking(move || load_folder(&folder, source_type))
            .await
            .map_err(|e| DomainError::internal(format!("loader task failed: {e}")))?
    }
}

pub fn load_folder(folder: &Path, source_type: SourceType) -> Result<Vec<Document>> {
    if !folder.is_dir() {
        return Err(DomainError::not_found(format!(
            "document folder {} does not exist",
            folder.display()
        )));
    }

    let mut documents = Vec::new();
    for path in matching_files(folder, source_type) {
        match source_type {
            SourceType::Pdf => match load_pdf(&path) {
                Ok(pages) => documents.extend(pages),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable pdf"),
            },
            SourceType::Markdown => match load_markdown(&path) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
            },
        }
    }

    tracing::info!(
        folder = %folder.display(),
        source_type = %source_type,
        count = documents.len(),
        "documents loaded"
    );
    Ok(documents)
}

fn matching_files(folder: &Path, source_type: SourceType) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && source_type.matches(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// One document per page with text.
fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let pdf = lopdf::Document::load(path)
        .map_err(|e| DomainError::internal(format!("failed to parse pdf: {e}")))?;
    let source = path.display().to_string();

    let mut pages = Vec::new();
    for page_number in pdf.get_pages().into_keys() {
        let text = match pdf.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(source = %source, page = page_number, error = %e, "no text on page");
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }

        let metadata =
            DocumentMetadata::new(source.as_str(), SourceType::Pdf).with_page(page_number as usize);
        pages.push(Document::new(text, metadata));
    }
    Ok(pages)
}

fn load_markdown(path: &Path) -> Result<Option<Document>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DomainError::internal(format!("failed to read {}: {e}", path.display())))?;
    if content.trim().is_empty() {
        return Ok(None);
    }

    let title = markdown_title(&content).or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    });

    let mut metadata = DocumentMetadata::new(path.display().to_string(), SourceType::Markdown);
    if let Some(title) = title {
        metadata = metadata.with_title(title);
    }
    Ok(Some(Document::new(content, metadata)))
}

fn markdown_title(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_pdf;
    use std::fs;

    #[tokio::test]
    async fn test_load_markdown_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "# Onboarding\n\nWelcome aboard.").unwrap();
        fs::write(dir.path().join("a.markdown"), "No heading here.").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("empty.md"), "   \n").unwrap();
        fs::create_dir(dir.path().join("team")).unwrap();
        fs::write(dir.path().join("team/c.md"), "# Team\nPeople.").unwrap();

        let docs = FsDocumentLoader::new()
            .load(dir.path(), SourceType::Markdown)
            .await
            .unwrap();

        assert_eq!(docs.len(), 3);
        assert!(docs[0].metadata.source.ends_with("a.markdown"));
        assert_eq!(docs[0].metadata.title.as_deref(), Some("a"));
        assert_eq!(docs[1].metadata.title.as_deref(), Some("Onboarding"));
        assert!(docs[2].metadata.source.ends_with("c.md"));
        assert!(docs.iter().all(|d| d.metadata.page.is_none()));
    }

    #[tokio::test]
    async fn test_empty_folder_yields_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        let docs = FsDocumentLoader::new()
            .load(dir.path(), SourceType::Pdf)
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsDocumentLoader::new()
            .load(&dir.path().join("nope"), SourceType::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_pdf_pages() {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(
            &dir.path().join("handbook.pdf"),
            &["Welcome to the company", "Vacation policy details", "Expense reports"],
        );
        fs::write(dir.path().join("broken.pdf"), "not a pdf").unwrap();

        let docs = FsDocumentLoader::new()
            .load(dir.path(), SourceType::Pdf)
            .await
            .unwrap();

        assert_eq!(docs.len(), 3);
        let pages: Vec<Option<usize>> = docs.iter().map(|d| d.metadata.page).collect();
        assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
        assert!(docs[1].content.contains("Vacation"));
        assert!(docs.iter().all(|d| d.metadata.source.ends_with("handbook.pdf")));
    }

    #[test]
    fn test_markdown_title() {
        assert_eq!(
            markdown_title("intro\n#  Spaces  \ntext"),
            Some("Spaces".to_string())
        );
        assert_eq!(markdown_title("## Not a title"), None);
    }
}
