/// Embedding model providers
pub mod embeddings;
