//! Fills an S3 Vectors index with 100 documents embedded through OpenAI,
//! then runs a test search.
//!
//! ```sh
//! OPENAI_API_KEY=... S3_VECTORS_BUCKET_NAME=... cargo run --example populate
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vectorkit::{
    config::StoreConfig,
    embeddings::{Embedder, FailurePolicy},
    manager::VectorStoreManager,
    providers::embeddings::OpenAIEmbeddingModel,
};
use vectorkit_s3vectors::S3VectorsStore;

const TOPICS: [&str; 10] = [
    "Python programming",
    "JavaScript development",
    "Machine learning",
    "Data science",
    "Web development",
    "Cloud computing",
    "Database management",
    "API design",
    "Software architecture",
    "DevOps practices",
];

const SUBTOPICS: [&str; 10] = [
    "Introduction to",
    "Advanced techniques in",
    "Best practices for",
    "Common patterns in",
    "Troubleshooting",
    "Optimization strategies for",
    "Security considerations in",
    "Future trends in",
    "Getting started with",
    "Mastering",
];

const VARIATIONS: [&str; 5] = [
    "The complete handbook for",
    "Essential skills in",
    "Professional guide to",
    "Modern approaches to",
    "Practical applications of",
];

const DOCUMENT_COUNT: usize = 100;
const EMBED_BATCH_SIZE: usize = 10;

fn generate_documents(count: usize) -> Vec<String> {
    let primary = TOPICS.iter().flat_map(|topic| {
        SUBTOPICS.iter().map(move |sub| {
            (*sub, *topic, "A comprehensive guide with examples and best practices")
        })
    });
    let variations = VARIATIONS.iter().flat_map(|variation| {
        TOPICS
            .iter()
            .map(move |topic| (*variation, *topic, "Industry insights and expert recommendations"))
    });
    primary
        .chain(variations)
        .take(count)
        .enumerate()
        .map(|(i, (lead, topic, tail))| format!("Document {}: {lead} {topic} - {tail}", i + 1))
        .collect()
}

#[tokio::main]
async fn main() -> vectorkit::error::Result<()> {
    _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let embedder = Embedder::new(
        Arc::new(OpenAIEmbeddingModel::new(None)?),
        FailurePolicy::Fallback,
    );
    let store = S3VectorsStore::from_config(StoreConfig::from_env()).await;
    let manager = VectorStoreManager::new(Arc::new(store));

    let current = manager.get_document_count().await?;
    info!(current, "Documents currently in index");
    if current > 0 {
        let deleted = manager.delete_all_documents().await?;
        info!(deleted, "Deleted existing documents");
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let contents = generate_documents(DOCUMENT_COUNT);
    let unique: HashSet<_> = contents.iter().collect();
    if unique.len() < contents.len() {
        error!("Duplicate documents generated, aborting");
        return Ok(());
    }

    let mut added = 0;
    let batches = contents.len().div_ceil(EMBED_BATCH_SIZE);
    for (n, batch) in contents.chunks(EMBED_BATCH_SIZE).enumerate() {
        info!("Processing batch {}/{batches}", n + 1);
        let embeddings = embedder.embed_batch(batch).await?;
        for (content, embedding) in batch.iter().zip(embeddings) {
            match manager.add_document(content, embedding).await {
                Ok(_) => added += 1,
                Err(e) => warn!(error = %e, "Failed to add document"),
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    info!(added, "Documents added");
    tokio::time::sleep(Duration::from_secs(2)).await;
    info!(count = manager.get_document_count().await?, "Final document count");

    let query = "Python programming";
    let query_embedding = embedder.embed(query).await?;
    let results = manager.search_documents(&query_embedding, 5).await?;
    info!("Found {} results for '{query}'", results.len());
    for (i, result) in results.iter().enumerate() {
        let preview: String = result.content.chars().take(60).collect();
        let distance = result
            .distance
            .map_or("N/A".to_string(), |d| format!("{d:.4}"));
        info!("{}. (Distance: {distance}) {preview}...", i + 1);
    }
    Ok(())
}
