//! Embedding backends.
//!
//! `AppState` holds an `Arc<dyn Embedder>`; production uses `OpenAiEmbedder`,
//! tests plug in a deterministic local implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm_client::retry::{with_backoff, RetryPolicy};
use crate::llm_client::{LlmError, OpenAiHttp};

/// Inputs per embeddings request.
const BATCH_SIZE: usize = 100;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::InvalidResponse("no embedding returned for query".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Vectors reordered by `index`; the count must match the request.
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
        if self.data.len() != expected {
            return Err(LlmError::InvalidResponse(format!(
                "expected {expected} embeddings, got {}",
                self.data.len()
            )));
        }
        self.data.sort_by_key(|d| d.index);
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}

pub struct OpenAiEmbedder {
    http: OpenAiHttp,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            http: OpenAiHttp::new(config)?,
            model: config.embedding_model.clone(),
            retry: config.retry.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let request = EmbeddingRequest {
                model: &self.model,
                input: batch,
            };
            let http = &self.http;
            let request = &request;
            let response: EmbeddingResponse = with_backoff(&self.retry, "Embedding", move || {
                http.post_json("embeddings", request)
            })
            .await?;
            vectors.extend(response.into_vectors(batch.len())?);
        }

        debug!("Embedded {} text(s) with {}", texts.len(), self.model);
        Ok(vectors)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::HashingEmbedder;
    use super::*;

    #[test]
    fn test_response_reordered_by_index() {
        let json = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "text-embedding-ada-002"
        }"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let vectors = response.into_vectors(2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_response_count_mismatch_is_error() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#).unwrap();
        assert!(matches!(
            response.into_vectors(3),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_default_embed_query_uses_documents_path() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_query("capital of France").await.unwrap();
        assert_eq!(query, embedder.embed("capital of France"));
    }
}
