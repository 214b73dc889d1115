//! # vectorkit - Core API Documentation
//!
//! vectorkit is a thin client layer over managed vector stores: it models
//! documents with fixed-size embeddings, generates those embeddings through
//! a provider, and drives the store's bucket/index lifecycle, inserts,
//! lookups, nearest-neighbour queries and deletes.
//!
//! ## Features
//!
//! - **Documents** with a fixed 128-dimension embedding invariant
//! - **Embedders** wrapping a provider with a fallback-or-raise failure policy
//! - **Vector Stores** behind a single trait (in-memory, S3 Vectors via `vectorkit_s3vectors`)
//! - **Similarity** helpers for local cosine re-ranking
//! - **Manager** workflows: add, list, search, count, delete-all
//! - **Bulk loading** through a fixed-size worker pool
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vectorkit::{
//!     embeddings::{Embedder, FailurePolicy},
//!     manager::VectorStoreManager,
//!     providers::embeddings::OpenAIEmbeddingModel,
//!     vector_store::in_memory_vec_store::InMemoryVectorStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> vectorkit::error::Result<()> {
//!     let embedder = Embedder::new(
//!         Arc::new(OpenAIEmbeddingModel::new(None)?),
//!         FailurePolicy::Fallback,
//!     );
//!     let manager = VectorStoreManager::new(Arc::new(InMemoryVectorStore::default()));
//!
//!     let embedding = embedder.embed("Rust ownership explained").await?;
//!     manager.add_document("Rust ownership explained", embedding).await?;
//!
//!     let query = embedder.embed("borrow checker").await?;
//!     for result in manager.search_documents(&query, 5).await? {
//!         println!("{:?} {}", result.distance, result.content);
//!     }
//!     Ok(())
//! }
//! ```

/// Bulk loading through a bounded worker pool
pub mod bulk;

/// Store location and connection settings
pub mod config;

/// Document model and the embedding dimension invariant
pub mod document;

/// Text embeddings support
pub mod embeddings;

/// Error types for all library operations
pub mod error;

/// Document workflows composed over a vector store
pub mod manager;

/// Builtin embedding model providers
pub mod providers;

/// Cosine similarity and local re-ranking
pub mod similarity;

/// Vector storage and retrieval
pub mod vector_store;
