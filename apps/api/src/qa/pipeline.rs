//! Question answering over one uploaded document.
//!
//! Search mode: chunk → embed → index → top-k → chat → attribute sources.
//! Full mode:   join all page text → chat.

use anyhow::anyhow;
use serde::Serialize;
use tracing::info;

use crate::documents::chunker::chunk_document;
use crate::documents::parser::parse_document;
use crate::documents::ParsedDocument;
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::qa::answer::{parse_answer, select_sources};
use crate::retrieval::embedder::Embedder;
use crate::retrieval::index::{ScoredChunk, VectorIndex};

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub top_k: usize,
    /// Return every retrieved chunk instead of only the ones the answer cites.
    pub show_all_chunks: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceExcerpt {
    pub source: String,
    pub page: u32,
    pub content: String,
    pub score: f32,
}

impl From<ScoredChunk> for SourceExcerpt {
    fn from(hit: ScoredChunk) -> Self {
        Self {
            source: hit.chunk.source,
            page: hit.chunk.page,
            content: hit.chunk.content,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchAnswer {
    pub answer: String,
    pub sources: Vec<SourceExcerpt>,
    pub chunk_count: usize,
}

/// Rejects blank questions before any network call is made.
pub fn validate_question(question: Option<&str>) -> Result<&str, AppError> {
    match question.map(str::trim) {
        Some(q) if !q.is_empty() => Ok(q),
        _ => Err(AppError::Validation("Please enter a question!".to_string())),
    }
}

/// Parses an upload off the async runtime; PDF extraction is CPU-bound.
pub async fn parse_upload(file_name: String, bytes: bytes::Bytes) -> Result<ParsedDocument, AppError> {
    let parsed = tokio::task::spawn_blocking(move || parse_document(&file_name, &bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow!("document parser task failed: {e}")))??;
    Ok(parsed)
}

/// Renders retrieved chunks as the reference text of the prompt.
pub fn format_excerpts(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("Content: {}\nSource: {}", hit.chunk.content, hit.chunk.source))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub async fn answer_with_search(
    doc: &ParsedDocument,
    question: &str,
    llm: &LlmClient,
    embedder: &dyn Embedder,
    options: SearchOptions,
) -> Result<SearchAnswer, AppError> {
    let chunks = chunk_document(doc);
    if chunks.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "Document contains no extractable text".to_string(),
        ));
    }
    info!("Indexing {} chunk(s) from {}", chunks.len(), doc.file_name);

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embedder.embed_documents(&texts).await?;
    let index = VectorIndex::build(chunks, vectors).map_err(|e| AppError::Internal(e.into()))?;

    let query = embedder.embed_query(question).await?;
    let hits = index
        .search(&query, options.top_k)
        .map_err(|e| AppError::Internal(e.into()))?;

    let raw = llm.send_chat_message(&format_excerpts(&hits), question).await?;
    let parsed = parse_answer(&raw);

    let sources = if options.show_all_chunks {
        hits
    } else {
        select_sources(&parsed, &hits)
    };

    Ok(SearchAnswer {
        answer: parsed.answer,
        sources: sources.into_iter().map(SourceExcerpt::from).collect(),
        chunk_count: index.len(),
    })
}

/// Sends the whole document as context. `max_chars` bounds the prompt size.
pub async fn answer_with_full_content(
    doc: &ParsedDocument,
    question: &str,
    llm: &LlmClient,
    max_chars: usize,
) -> Result<String, AppError> {
    let docs = doc.full_text();
    let length = docs.chars().count();
    if length > max_chars {
        return Err(AppError::UnprocessableEntity(format!(
            "Document is too long to send in full ({length} characters, limit {max_chars}). \
             Use the search endpoint instead."
        )));
    }

    info!("Answering from full content of {} ({length} chars)", doc.file_name);
    Ok(llm.send_chat_message(&docs, question).await?)
}
