// Document ingestion: uploaded bytes → cleaned page text → retrievable chunks.
// Nothing here talks to the network; see `retrieval` for embeddings.

pub mod chunker;
pub mod parser;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("File type not supported: {0}")]
    UnsupportedType(String),

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("Failed to read DOCX: {0}")]
    Docx(String),

    #[error("Document contains no extractable text")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Detects the document type from its file extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self, DocumentError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            "txt" => Ok(DocumentKind::Txt),
            _ => Err(DocumentError::UnsupportedType(file_name.to_string())),
        }
    }
}

/// One page of extracted text. DOCX and TXT files are a single page 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    pub file_name: String,
    pub kind: DocumentKind,
    pub pages: Vec<Page>,
}

impl ParsedDocument {
    /// All page text joined by single spaces, as sent in full-content mode.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
