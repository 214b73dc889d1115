//! Loads 1000 random 128-dimensional records into a dedicated S3 Vectors
//! index with 4 parallel workers and reports throughput.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use vectorkit::{
    bulk::{BulkLoadConfig, BulkLoader},
    config::StoreConfig,
    document::EMBEDDING_DIMENSIONS,
    manager::VectorStoreManager,
    vector_store::VectorStore,
};
use vectorkit_s3vectors::S3VectorsStore;

const INDEX_NAME: &str = "performance-test";

#[tokio::main]
async fn main() -> vectorkit::error::Result<()> {
    _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BulkLoadConfig::default();
    let store: Arc<dyn VectorStore> = Arc::new(
        S3VectorsStore::from_config(StoreConfig::from_env().with_index_name(INDEX_NAME)).await,
    );
    info!(
        records = config.total_records,
        dimensions = EMBEDDING_DIMENSIONS,
        batch_size = config.batch_size,
        workers = config.workers,
        "Starting bulk load"
    );

    store.create_index(EMBEDDING_DIMENSIONS).await?;

    let manager = VectorStoreManager::new(store.clone());
    let cleaned = manager.delete_all_documents().await?;
    info!(cleaned, "Cleaned existing documents");

    let report = BulkLoader::new(store, config.clone()).run().await;

    info!(
        "Total time: {:.2}s, records uploaded: {}/{}, records per second: {:.2}",
        report.elapsed.as_secs_f64(),
        report.records_uploaded(),
        config.total_records,
        report.records_per_second()
    );
    info!(
        "Average batch time: {:.2}s, successful batches: {}/{}",
        report.average_batch_time().as_secs_f64(),
        report.successful_batches(),
        report.outcomes.len()
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    let sample = manager.list_documents(10).await?;
    info!(sample = sample.len(), "Verification: index now contains vectors");
    Ok(())
}
