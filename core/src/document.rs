use rand::Rng;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::vector_store::StoreRecord;

/// Number of components every stored embedding carries.
pub const EMBEDDING_DIMENSIONS: usize = 128;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Embedding must be 128 dimensions, got {0}")]
    InvalidEmbeddingDimension(usize),
}

/// A piece of text paired with its embedding, addressed by a unique key.
///
/// The embedding always has exactly [`EMBEDDING_DIMENSIONS`] components, a
/// `Document` cannot be constructed otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    key: String,
    content: String,
    embedding: Vec<f32>,
}

impl Document {
    /// Builds a document from its parts, validating the embedding length.
    ///
    /// # Errors
    /// Returns [`DocumentError::InvalidEmbeddingDimension`] when `embedding`
    /// doesn't have [`EMBEDDING_DIMENSIONS`] components.
    pub fn new(
        key: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Result<Self, DocumentError> {
        if embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(DocumentError::InvalidEmbeddingDimension(embedding.len()));
        }
        Ok(Self {
            key: key.into(),
            content: content.into(),
            embedding,
        })
    }

    /// Creates a document under a freshly generated UUID v4 key.
    ///
    /// When no embedding is supplied a random placeholder vector is used.
    ///
    /// # Errors
    /// Fails like [`Document::new`] when the supplied embedding has the wrong length.
    pub fn create(
        content: impl Into<String>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Self, DocumentError> {
        let embedding = embedding.unwrap_or_else(|| random_embedding(EMBEDDING_DIMENSIONS));
        Self::new(uuid::Uuid::new_v4().to_string(), content, embedding)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Projects the document into the record shape the store accepts.
    #[must_use]
    pub fn to_store_record(&self) -> StoreRecord {
        StoreRecord::new(
            self.key.clone(),
            self.embedding.clone(),
            self.content.clone(),
            Map::<String, Value>::new(),
        )
    }
}

/// Uniformly random vector with every component in `[0, 1)`.
pub fn random_embedding(dimensions: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dimensions).map(|_| rng.gen::<f32>()).collect()
}
