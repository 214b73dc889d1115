use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{
    CreateOutcome, IndexLocation, ListPage, QueryMatch, QueryOptions, StoreRecord, StoredVector,
    VectorData, VectorStore, VectorStoreError, MAX_BATCH_SIZE, MAX_LIST_PAGE_SIZE,
};
use crate::similarity::cosine_similarity;

/// A process-local [`VectorStore`] with the same observable behavior as the
/// managed service: cosine distance, ordered keys and offset continuation tokens.
pub struct InMemoryVectorStore {
    location: IndexLocation,
    bucket_created: AtomicBool,
    dimensions: RwLock<Option<usize>>,
    records: RwLock<BTreeMap<String, StoreRecord>>,
    list_calls: AtomicUsize,
}

impl InMemoryVectorStore {
    pub fn new(bucket: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            location: IndexLocation {
                bucket: bucket.into(),
                index: index.into(),
                region: "local".to_string(),
            },
            bucket_created: AtomicBool::new(false),
            dimensions: RwLock::new(None),
            records: RwLock::new(BTreeMap::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `list_vectors` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new("in-memory", "documents")
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn location(&self) -> IndexLocation {
        self.location.clone()
    }

    async fn create_bucket(&self) -> Result<CreateOutcome, VectorStoreError> {
        if self.bucket_created.swap(true, Ordering::AcqRel) {
            Ok(CreateOutcome::AlreadyExists)
        } else {
            Ok(CreateOutcome::Created)
        }
    }

    async fn create_index(&self, dimensions: usize) -> Result<CreateOutcome, VectorStoreError> {
        let mut current = self.dimensions.write().await;
        if current.is_some() {
            return Ok(CreateOutcome::AlreadyExists);
        }
        *current = Some(dimensions);
        Ok(CreateOutcome::Created)
    }

    async fn insert_documents(&self, records: &[StoreRecord]) -> Result<(), VectorStoreError> {
        if records.len() > MAX_BATCH_SIZE {
            return Err(VectorStoreError::Fatal(format!(
                "batch of {} records exceeds the limit of {MAX_BATCH_SIZE}",
                records.len()
            )));
        }
        if let Some(dimensions) = *self.dimensions.read().await {
            if let Some(bad) = records.iter().find(|r| r.data.float32.len() != dimensions) {
                return Err(VectorStoreError::Fatal(format!(
                    "vector `{}` has {} dimensions, index expects {dimensions}",
                    bad.key,
                    bad.data.float32.len()
                )));
            }
        }
        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(record.key.clone(), record.clone());
        }
        Ok(())
    }

    async fn get_documents(&self, keys: &[String]) -> Result<Vec<StoredVector>, VectorStoreError> {
        let stored = self.records.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| stored.get(k))
            .map(|r| StoredVector {
                key: r.key.clone(),
                data: Some(VectorData {
                    float32: r.data.float32.clone(),
                }),
                metadata: Some(r.metadata_map()),
            })
            .collect())
    }

    async fn search_similar(
        &self,
        query: &[f32],
        options: QueryOptions,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let stored = self.records.read().await;
        let mut results = stored
            .values()
            .map(|r| (1.0 - cosine_similarity(query, &r.data.float32), r))
            .collect::<Vec<_>>();
        results.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(options.top_k);
        Ok(results
            .into_iter()
            .map(|(distance, r)| QueryMatch {
                key: r.key.clone(),
                metadata: options.return_metadata.then(|| r.metadata_map()),
                distance: options.return_distance.then_some(distance),
            })
            .collect())
    }

    async fn delete_documents(&self, keys: &[String]) -> Result<(), VectorStoreError> {
        let mut stored = self.records.write().await;
        for key in keys {
            stored.remove(key);
        }
        Ok(())
    }

    async fn list_vectors(
        &self,
        max_results: usize,
        next_token: Option<&str>,
    ) -> Result<ListPage, VectorStoreError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let offset = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                VectorStoreError::Fatal(format!("invalid continuation token `{token}`"))
            })?,
            None => 0,
        };
        let page_size = max_results.clamp(1, MAX_LIST_PAGE_SIZE);
        let stored = self.records.read().await;
        let keys: Vec<String> = stored.keys().skip(offset).take(page_size).cloned().collect();
        let consumed = offset + keys.len();
        let next_token = (consumed < stored.len()).then(|| consumed.to_string());
        Ok(ListPage { keys, next_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn unit(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; 128];
        v[i] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = InMemoryVectorStore::default();
        assert_eq!(store.create_bucket().await, Ok(CreateOutcome::Created));
        assert_eq!(store.create_bucket().await, Ok(CreateOutcome::AlreadyExists));
        assert_eq!(store.create_index(128).await, Ok(CreateOutcome::Created));
        assert_eq!(store.create_index(128).await, Ok(CreateOutcome::AlreadyExists));
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let store = InMemoryVectorStore::default();
        let doc = Document::create("Hello from the store!", None).unwrap();
        store.insert_documents(&[doc.to_store_record()]).await.unwrap();

        let fetched = store
            .get_documents(&[doc.key().to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].key, doc.key());
        assert_eq!(fetched[0].content(), Some("Hello from the store!"));
        assert_eq!(fetched[0].data.as_ref().unwrap().float32, doc.embedding());
    }

    #[tokio::test]
    async fn test_insert_rejects_oversized_batch_and_wrong_dimension() {
        let store = InMemoryVectorStore::default();
        let records: Vec<_> = (0..=MAX_BATCH_SIZE)
            .map(|_| Document::create("x", None).unwrap().to_store_record())
            .collect();
        assert!(matches!(
            store.insert_documents(&records).await,
            Err(VectorStoreError::Fatal(_))
        ));
        assert!(store.is_empty().await);

        store.create_index(4).await.unwrap();
        let record = Document::create("x", None).unwrap().to_store_record();
        assert!(store.insert_documents(&[record]).await.is_err());
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let store = InMemoryVectorStore::default();
        let near = Document::create("near", Some(unit(0))).unwrap();
        let far = Document::create("far", Some(unit(1))).unwrap();
        store
            .insert_documents(&[far.to_store_record(), near.to_store_record()])
            .await
            .unwrap();

        let bare = store
            .search_similar(&unit(0), QueryOptions::top_k(1))
            .await
            .unwrap();
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].key, near.key());
        assert!(bare[0].metadata.is_none());
        assert!(bare[0].distance.is_none());

        let full = store
            .search_similar(&unit(0), QueryOptions::top_k(5).with_metadata().with_distance())
            .await
            .unwrap();
        assert_eq!(full.len(), 2);
        assert!(full[0].distance.unwrap() < full[1].distance.unwrap());
        assert_eq!(
            full[1].metadata.as_ref().unwrap().get("content").unwrap(),
            "far"
        );
    }

    #[tokio::test]
    async fn test_delete_ignores_missing_keys() {
        let store = InMemoryVectorStore::default();
        let doc = Document::create("bye", None).unwrap();
        store.insert_documents(&[doc.to_store_record()]).await.unwrap();
        store
            .delete_documents(&[doc.key().to_string(), "never-existed".to_string()])
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = InMemoryVectorStore::default();
        let records: Vec<_> = (0..5)
            .map(|i| Document::new(format!("k{i}"), "c", unit(i)).unwrap().to_store_record())
            .collect();
        store.insert_documents(&records).await.unwrap();

        let first = store.list_vectors(2, None).await.unwrap();
        assert_eq!(first.keys, ["k0", "k1"]);
        let second = store
            .list_vectors(2, first.next_token.as_deref())
            .await
            .unwrap();
        assert_eq!(second.keys, ["k2", "k3"]);
        let third = store
            .list_vectors(2, second.next_token.as_deref())
            .await
            .unwrap();
        assert_eq!(third.keys, ["k4"]);
        assert!(third.next_token.is_none());
        assert_eq!(store.list_calls(), 3);

        assert!(store.list_vectors(2, Some("garbage")).await.is_err());
    }
}
