use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// Kind of files the loader reads from the document folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Markdown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "md",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["pdf"],
            Self::Markdown => &["md", "markdown"],
        }
    }

    /// Default export sub-folder under the confluence data directory.
    pub fn default_folder(&self) -> &'static str {
        match self {
            Self::Pdf => "data/confluence/pdfs",
            Self::Markdown => "data/confluence/markdown",
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(DomainError::unsupported_source(format!(
                "'{other}' (expected 'pdf' or 'md')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_type() {
        assert_eq!("pdf".parse::<SourceType>().unwrap(), SourceType::Pdf);
        assert_eq!("MD".parse::<SourceType>().unwrap(), SourceType::Markdown);
        assert_eq!(
            " markdown ".parse::<SourceType>().unwrap(),
            SourceType::Markdown
        );
    }

    #[test]
    fn test_parse_unknown_source_type() {
        let err = "docx".parse::<SourceType>().unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedSourceType(_)));
    }

    #[test]
    fn test_matches_extension_case_insensitive() {
        assert!(SourceType::Pdf.matches(Path::new("handbook/Policy.PDF")));
        assert!(SourceType::Markdown.matches(Path::new("page.markdown")));
        assert!(!SourceType::Markdown.matches(Path::new("page.pdf")));
        assert!(!SourceType::Pdf.matches(Path::new("README")));
    }
}
