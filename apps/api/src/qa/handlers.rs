//! Axum route handlers for document parsing and question answering.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::documents::{DocumentKind, Page};
use crate::errors::AppError;
use crate::qa::pipeline::{
    answer_with_full_content, answer_with_search, parse_upload, validate_question, SearchAnswer,
    SearchOptions,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Fields of a multipart upload: `file`, `question`, `show_all_chunks`.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<(String, Bytes)>,
    pub question: Option<String>,
    pub show_all_chunks: bool,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(str::to_string).ok_or_else(|| {
                        AppError::Validation("The 'file' field must carry a file name".to_string())
                    })?;
                    let bytes = field.bytes().await?;
                    form.file = Some((file_name, bytes));
                }
                "question" => form.question = Some(field.text().await?),
                "show_all_chunks" => form.show_all_chunks = parse_flag(&field.text().await?)?,
                other => debug!("Ignoring unknown multipart field '{other}'"),
            }
        }

        Ok(form)
    }

    fn take_file(&mut self) -> Result<(String, Bytes), AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::Validation("Please upload a document!".to_string()))
    }
}

fn parse_flag(raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "off" | "no" => Ok(false),
        "true" | "1" | "on" | "yes" => Ok(true),
        other => Err(AppError::Validation(format!(
            "show_all_chunks must be true or false, got '{other}'"
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub file_name: String,
    pub kind: DocumentKind,
    pub page_count: usize,
    /// Page texts joined the way the full-content mode sends them.
    pub text: String,
    pub pages: Vec<Page>,
}

#[derive(Debug, Serialize)]
pub struct FullContentResponse {
    pub answer: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents/parse
///
/// Returns the cleaned text of every page, without asking anything.
pub async fn handle_parse(multipart: Multipart) -> Result<Json<ParseResponse>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let (file_name, bytes) = form.take_file()?;
    let doc = parse_upload(file_name, bytes).await?;

    let text = doc.full_text();
    Ok(Json(ParseResponse {
        file_name: doc.file_name,
        kind: doc.kind,
        page_count: doc.pages.len(),
        text,
        pages: doc.pages,
    }))
}

/// POST /api/v1/qa/search
///
/// Answers from the top-k most similar chunks and lists the cited ones
/// (or every retrieved chunk when `show_all_chunks` is set).
pub async fn handle_search(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SearchAnswer>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let question = validate_question(form.question.as_deref())?.to_string();
    let (file_name, bytes) = form.take_file()?;
    let doc = parse_upload(file_name, bytes).await?;

    let options = SearchOptions {
        top_k: state.config.search_top_k,
        show_all_chunks: form.show_all_chunks,
    };
    let answer =
        answer_with_search(&doc, &question, &state.llm, state.embedder.as_ref(), options).await?;

    Ok(Json(answer))
}

/// POST /api/v1/qa/full
///
/// Sends the entire document as context; the answer is returned verbatim.
pub async fn handle_full_content(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<FullContentResponse>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let question = validate_question(form.question.as_deref())?.to_string();
    let (file_name, bytes) = form.take_file()?;
    let doc = parse_upload(file_name, bytes).await?;

    let answer = answer_with_full_content(
        &doc,
        &question,
        &state.llm,
        state.config.max_full_content_chars,
    )
    .await?;

    Ok(Json(FullContentResponse { answer }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_accepts_common_spellings() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag(" ON ").unwrap());
        assert!(!parse_flag("").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn test_missing_file_is_validation_error() {
        let mut form = UploadForm::default();
        assert!(matches!(form.take_file(), Err(AppError::Validation(_))));
    }
}
