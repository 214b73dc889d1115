//! Bulk loading of synthetic records through a fixed-size worker pool.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::{
    document::{random_embedding, EMBEDDING_DIMENSIONS},
    vector_store::{StoreRecord, VectorStore, VectorStoreError, MAX_BATCH_SIZE},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BulkLoadConfig {
    pub total_records: usize,
    /// Records per insert call, capped at [`MAX_BATCH_SIZE`].
    pub batch_size: usize,
    pub workers: usize,
    pub dimensions: usize,
    pub key_prefix: String,
}

impl Default for BulkLoadConfig {
    fn default() -> Self {
        Self {
            total_records: 1000,
            batch_size: MAX_BATCH_SIZE,
            workers: 4,
            dimensions: EMBEDDING_DIMENSIONS,
            key_prefix: "perf-test".to_string(),
        }
    }
}

impl BulkLoadConfig {
    fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Splits `total_records` into jobs, the last one possibly smaller.
    pub fn jobs(&self) -> Vec<BatchJob> {
        let batch_size = self.effective_batch_size();
        (0..self.total_records.div_ceil(batch_size))
            .map(|batch| BatchJob {
                batch,
                size: batch_size.min(self.total_records - batch * batch_size),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchJob {
    pub batch: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch: usize,
    pub size: usize,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkLoadReport {
    /// Outcomes in completion order.
    pub outcomes: Vec<BatchOutcome>,
    pub elapsed: Duration,
}

impl BulkLoadReport {
    pub fn successful_batches(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn records_uploaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.size)
            .sum()
    }

    pub fn records_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.records_uploaded() as f64 / secs
    }

    /// Mean upload time over successful batches, zero when none succeeded.
    pub fn average_batch_time(&self) -> Duration {
        let successes: Vec<_> = self.outcomes.iter().filter(|o| o.is_success()).collect();
        if successes.is_empty() {
            return Duration::ZERO;
        }
        successes.iter().map(|o| o.elapsed).sum::<Duration>() / successes.len() as u32
    }
}

/// Random records for one batch, keyed `{prefix}-{8 hex}-{record id}`.
pub fn generate_batch(job: BatchJob, config: &BulkLoadConfig) -> Vec<StoreRecord> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    (0..job.size)
        .map(|i| {
            let record_id = job.batch * config.effective_batch_size() + i;
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            let mut extra = Map::new();
            extra.insert("batch".to_string(), Value::from(job.batch));
            extra.insert("timestamp".to_string(), Value::from(timestamp));
            StoreRecord::new(
                format!("{}-{}-{record_id}", config.key_prefix, &suffix[..8]),
                random_embedding(config.dimensions),
                format!("Performance test document {record_id}"),
                extra,
            )
        })
        .collect()
}

/// Uploads synthetic batches concurrently; each worker pulls jobs off a
/// shared queue until it's empty.
pub struct BulkLoader {
    store: Arc<dyn VectorStore>,
    config: BulkLoadConfig,
}

impl BulkLoader {
    pub fn new(store: Arc<dyn VectorStore>, config: BulkLoadConfig) -> Self {
        Self { store, config }
    }

    /// Runs every job. Failed batches are recorded in the report, they don't
    /// stop the remaining ones. The report holds one outcome per batch even
    /// when a worker panics.
    #[instrument(skip(self), fields(total = self.config.total_records, workers = self.config.workers))]
    pub async fn run(&self) -> BulkLoadReport {
        let started = Instant::now();
        let jobs = self.config.jobs();
        let expected = jobs.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(jobs.clone())));
        let (tx, mut rx) = mpsc::channel::<BatchOutcome>(expected.max(1));

        let mut workers = JoinSet::new();
        for _ in 0..self.config.workers.max(1) {
            let queue = queue.clone();
            let tx = tx.clone();
            let store = self.store.clone();
            let config = self.config.clone();
            workers.spawn(async move {
                loop {
                    let Some(job) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let outcome = upload_batch(store.as_ref(), job, &config).await;
                    if tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(expected);
        while let Some(outcome) = rx.recv().await {
            match &outcome.error {
                None => info!(
                    batch = outcome.batch,
                    size = outcome.size,
                    elapsed = ?outcome.elapsed,
                    "Batch uploaded"
                ),
                Some(error) => warn!(batch = outcome.batch, %error, "Batch failed"),
            }
            outcomes.push(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Bulk load worker died");
            }
        }
        // batches lost with a dead worker, or left queued after every worker died
        if outcomes.len() < expected {
            for job in jobs {
                if !outcomes.iter().any(|o| o.batch == job.batch) {
                    warn!(batch = job.batch, "Batch has no outcome");
                    outcomes.push(BatchOutcome {
                        batch: job.batch,
                        size: job.size,
                        elapsed: Duration::ZERO,
                        error: Some("worker terminated before reporting".to_string()),
                    });
                }
            }
        }

        BulkLoadReport {
            outcomes,
            elapsed: started.elapsed(),
        }
    }
}

async fn upload_batch(store: &dyn VectorStore, job: BatchJob, config: &BulkLoadConfig) -> BatchOutcome {
    let started = Instant::now();
    let records = generate_batch(job, config);
    let result = store.insert_documents(&records).await;
    BatchOutcome {
        batch: job.batch,
        size: job.size,
        elapsed: started.elapsed(),
        error: result.err().map(|e| e.to_string()),
    }
}

/// Inserts `records` sequentially in chunks the store accepts, returning
/// how many were written.
///
/// # Errors
/// Stops at the first failing chunk.
pub async fn insert_chunked(
    store: &dyn VectorStore,
    records: &[StoreRecord],
) -> Result<usize, VectorStoreError> {
    let mut inserted = 0;
    for chunk in records.chunks(MAX_BATCH_SIZE) {
        store.insert_documents(chunk).await?;
        inserted += chunk.len();
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::{
        in_memory_vec_store::InMemoryVectorStore, CreateOutcome, IndexLocation, ListPage,
        QueryMatch, QueryOptions, StoredVector,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Delegates to an in-memory store but rejects every odd batch, and
    /// panics on `panic_batch`.
    struct FlakyStore {
        inner: InMemoryVectorStore,
        panic_batch: Option<u64>,
    }

    impl FlakyStore {
        fn new(panic_batch: Option<u64>) -> Self {
            Self {
                inner: InMemoryVectorStore::default(),
                panic_batch,
            }
        }
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        fn location(&self) -> IndexLocation {
            self.inner.location()
        }
        async fn create_bucket(&self) -> Result<CreateOutcome, VectorStoreError> {
            self.inner.create_bucket().await
        }
        async fn create_index(&self, dimensions: usize) -> Result<CreateOutcome, VectorStoreError> {
            self.inner.create_index(dimensions).await
        }
        async fn insert_documents(&self, records: &[StoreRecord]) -> Result<(), VectorStoreError> {
            let batch = records
                .first()
                .and_then(|r| r.metadata.extra.get("batch"))
                .and_then(Value::as_u64);
            if batch.is_some() && batch == self.panic_batch {
                panic!("store crashed on batch {batch:?}");
            }
            if batch.is_some_and(|b| b % 2 == 1) {
                return Err(VectorStoreError::Throttled("TooManyRequestsException".into()));
            }
            self.inner.insert_documents(records).await
        }
        async fn get_documents(&self, keys: &[String]) -> Result<Vec<StoredVector>, VectorStoreError> {
            self.inner.get_documents(keys).await
        }
        async fn search_similar(
            &self,
            query: &[f32],
            options: QueryOptions,
        ) -> Result<Vec<QueryMatch>, VectorStoreError> {
            self.inner.search_similar(query, options).await
        }
        async fn delete_documents(&self, keys: &[String]) -> Result<(), VectorStoreError> {
            self.inner.delete_documents(keys).await
        }
        async fn list_vectors(
            &self,
            max_results: usize,
            next_token: Option<&str>,
        ) -> Result<ListPage, VectorStoreError> {
            self.inner.list_vectors(max_results, next_token).await
        }
    }

    #[test]
    fn test_jobs_split() {
        let config = BulkLoadConfig {
            total_records: 1234,
            ..BulkLoadConfig::default()
        };
        let jobs = config.jobs();
        assert_eq!(
            jobs,
            [
                BatchJob { batch: 0, size: 500 },
                BatchJob { batch: 1, size: 500 },
                BatchJob { batch: 2, size: 234 },
            ]
        );

        let oversized = BulkLoadConfig {
            batch_size: 5000,
            ..BulkLoadConfig::default()
        };
        assert!(oversized.jobs().iter().all(|j| j.size <= MAX_BATCH_SIZE));
        assert!(BulkLoadConfig { total_records: 0, ..BulkLoadConfig::default() }.jobs().is_empty());
    }

    #[test]
    fn test_generate_batch() {
        let config = BulkLoadConfig::default();
        let records = generate_batch(BatchJob { batch: 1, size: 3 }, &config);
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert!(first.key.starts_with("perf-test-"));
        assert!(first.key.ends_with("-500"));
        assert_eq!(first.data.float32.len(), EMBEDDING_DIMENSIONS);
        assert_eq!(first.metadata.content, "Performance test document 500");
        assert_eq!(first.metadata.extra.get("batch"), Some(&Value::from(1)));
        assert!(first.metadata.extra.contains_key("timestamp"));

        let keys: HashSet<_> = records.iter().map(|r| &r.key).collect();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_load() {
        let store = Arc::new(InMemoryVectorStore::default());
        let loader = BulkLoader::new(store.clone(), BulkLoadConfig::default());

        let report = loader.run().await;
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.successful_batches(), 2);
        assert_eq!(report.records_uploaded(), 1000);
        assert_eq!(store.len().await, 1000);
        assert!(report.records_per_second() > 0.0);
    }

    #[tokio::test]
    async fn test_bulk_load_records_failures() {
        let store = Arc::new(FlakyStore::new(None));
        let config = BulkLoadConfig {
            total_records: 10,
            batch_size: 2,
            workers: 3,
            ..BulkLoadConfig::default()
        };
        let report = BulkLoader::new(store.clone(), config).run().await;

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.successful_batches(), 3);
        assert_eq!(report.records_uploaded(), 6);
        assert_eq!(store.inner.len().await, 6);

        let mut failed: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.batch)
            .collect();
        failed.sort_unstable();
        assert_eq!(failed, [1, 3]);
        assert!(report
            .outcomes
            .iter()
            .filter_map(|o| o.error.as_deref())
            .all(|e| e.contains("TooManyRequestsException")));
    }

    #[tokio::test]
    async fn test_bulk_load_survives_worker_panic() {
        let store = Arc::new(FlakyStore::new(Some(2)));
        let config = BulkLoadConfig {
            total_records: 10,
            batch_size: 2,
            workers: 1,
            ..BulkLoadConfig::default()
        };
        let report = BulkLoader::new(store.clone(), config).run().await;

        assert_eq!(report.outcomes.len(), 5);
        let mut lost: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| o.error.as_deref() == Some("worker terminated before reporting"))
            .map(|o| o.batch)
            .collect();
        lost.sort_unstable();
        assert_eq!(lost, [2, 3, 4]);
        assert_eq!(report.successful_batches(), 1);
        assert_eq!(store.inner.len().await, 2);
    }

    #[test]
    fn test_report_without_successes() {
        let report = BulkLoadReport {
            outcomes: vec![BatchOutcome {
                batch: 0,
                size: 10,
                elapsed: Duration::from_millis(5),
                error: Some("boom".into()),
            }],
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(report.records_uploaded(), 0);
        assert_eq!(report.average_batch_time(), Duration::ZERO);
        assert_eq!(report.records_per_second(), 0.0);
    }

    #[tokio::test]
    async fn test_insert_chunked() {
        let store = InMemoryVectorStore::default();
        let records = generate_batch(
            BatchJob { batch: 0, size: 1200 },
            &BulkLoadConfig {
                batch_size: 1200,
                ..BulkLoadConfig::default()
            },
        );
        assert_eq!(insert_chunked(&store, &records).await, Ok(1200));
        assert_eq!(store.len().await, 1200);
    }
}
