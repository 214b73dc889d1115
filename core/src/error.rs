use crate::{
    config::ConfigError, document::DocumentError, embeddings::EmbedderError,
    vector_store::VectorStoreError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
    #[error("VectorStore error: {0}")]
    VectorStore(#[from] VectorStoreError),
    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
