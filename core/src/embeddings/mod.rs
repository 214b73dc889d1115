pub mod model;

use crate::document::{random_embedding, EMBEDDING_DIMENSIONS};
use model::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmbedderError {
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("Provider error -> HTTP Status {0}: {1}")]
    ProviderError(u16, String),
    #[error("Expected {expected} dimensions, provider returned {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Expected {expected} embeddings, provider returned {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("Invalid embedder config: {0}")]
    InvalidConfig(String),
}

/// What an [`Embedder`] does when the model fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and substitute random vectors.
    #[default]
    Fallback,
    /// Return the failure to the caller.
    Raise,
}

/// Wraps an [`EmbeddingModel`], enforcing the output dimension and applying
/// a [`FailurePolicy`] to anything that goes wrong.
#[derive(Clone)]
pub struct Embedder {
    model: Arc<dyn EmbeddingModel>,
    dimensions: usize,
    policy: FailurePolicy,
}

impl Embedder {
    pub fn new(model: Arc<dyn EmbeddingModel>, policy: FailurePolicy) -> Self {
        Self {
            model,
            dimensions: EMBEDDING_DIMENSIONS,
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Embeds a single text.
    ///
    /// # Errors
    /// Only with [`FailurePolicy::Raise`], when the model fails or returns a
    /// vector of the wrong dimension.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let result = self
            .model
            .embed(text)
            .await
            .and_then(|e| self.check_dimensions(e));
        match result {
            Ok(embedding) => Ok(embedding),
            Err(e) => self.recover(e, || random_embedding(self.dimensions)),
        }
    }

    /// Embeds many texts in one request, preserving input order and count.
    ///
    /// # Errors
    /// Only with [`FailurePolicy::Raise`], see [`Embedder::embed`].
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let result: Result<Vec<Vec<f32>>, EmbedderError> =
            self.model.embed_batch(texts).await.and_then(|embeddings| {
                if embeddings.len() != texts.len() {
                    return Err(EmbedderError::CountMismatch {
                        expected: texts.len(),
                        actual: embeddings.len(),
                    });
                }
                embeddings
                    .into_iter()
                    .map(|e| self.check_dimensions(e))
                    .collect()
            });
        match result {
            Ok(embeddings) => Ok(embeddings),
            Err(e) => self.recover(e, || {
                texts.iter().map(|_| random_embedding(self.dimensions)).collect()
            }),
        }
    }

    fn check_dimensions(&self, embedding: Vec<f32>) -> Result<Vec<f32>, EmbedderError> {
        if embedding.len() == self.dimensions {
            Ok(embedding)
        } else {
            Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            })
        }
    }

    fn recover<T>(&self, error: EmbedderError, fallback: impl FnOnce() -> T) -> Result<T, EmbedderError> {
        match self.policy {
            FailurePolicy::Raise => Err(error),
            FailurePolicy::Fallback => {
                warn!(%error, "Embedding generation failed, using random embedding");
                Ok(fallback())
            }
        }
    }
}
