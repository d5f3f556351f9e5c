//! Image embedding client
//!
//! Posts raw image bytes to an embedding model server and expects
//! `{"embedding": [f32, ...]}` back. Any failure yields no embedding; the
//! pipeline then skips visual duplicate detection for that submission.

use crate::types::{CollaboratorError, Embedding, EmbeddingExtractor};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("civic-intake/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// HTTP [`EmbeddingExtractor`]
pub struct HttpEmbeddingExtractor {
    http_client: reqwest::Client,
    endpoint: String,
    dimension: usize,
}

impl HttpEmbeddingExtractor {
    pub fn new(
        endpoint: String,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint,
            dimension,
        })
    }

    async fn request(&self, image: &[u8]) -> Result<Vec<f32>, CollaboratorError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::InvalidResponse(format!(
                "embedding server returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingExtractor for HttpEmbeddingExtractor {
    async fn embed(&self, image: &[u8]) -> Option<Embedding> {
        let raw = match self.request(image).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Embedding extraction failed");
                return None;
            }
        };

        if raw.len() != self.dimension {
            warn!(
                expected = self.dimension,
                actual = raw.len(),
                "Embedding server returned wrong dimension"
            );
            return None;
        }

        let embedding = Embedding::from_raw(raw);
        if embedding.is_none() {
            warn!("Embedding server returned a degenerate vector");
        } else {
            debug!(bytes = image.len(), "Image embedded");
        }
        embedding
    }
}

/// Extractor used when no embedding endpoint is configured
pub struct DisabledEmbeddingExtractor;

#[async_trait]
impl EmbeddingExtractor for DisabledEmbeddingExtractor {
    async fn embed(&self, _image: &[u8]) -> Option<Embedding> {
        None
    }
}
