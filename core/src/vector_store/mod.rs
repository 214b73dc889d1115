pub mod in_memory_vec_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Largest number of records a single insert call may carry.
pub const MAX_BATCH_SIZE: usize = 500;

/// Largest page a listing call may request.
pub const MAX_LIST_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorStoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Throttled: {0}")]
    Throttled(String),
    #[error("Vector store failure: {0}")]
    Fatal(String),
    #[error("Invalid vector store config: {0}")]
    InvalidConfig(String),
}

impl VectorStoreError {
    /// Maps a service error code (e.g. `ConflictException`) onto the error taxonomy.
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some("NotFoundException" | "ResourceNotFoundException") => Self::NotFound(message),
            Some(c) if c == "ConflictException" || c.contains("AlreadyExists") => {
                Self::Conflict(message)
            }
            Some(
                "ThrottlingException"
                | "TooManyRequestsException"
                | "ServiceUnavailableException"
                | "SlowDown",
            ) => Self::Throttled(message),
            _ => Self::Fatal(message),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

/// Result of an idempotent create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Where a store's vectors live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexLocation {
    pub bucket: String,
    pub index: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorData {
    pub float32: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub content: String,
    /// Provenance fields such as `batch` or `timestamp`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A vector in the shape the store accepts on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub key: String,
    pub data: VectorData,
    pub metadata: RecordMetadata,
}

impl StoreRecord {
    pub fn new(
        key: String,
        embedding: Vec<f32>,
        content: String,
        extra: Map<String, Value>,
    ) -> Self {
        Self {
            key,
            data: VectorData { float32: embedding },
            metadata: RecordMetadata { content, extra },
        }
    }

    /// Metadata as a single JSON map, `content` included.
    pub fn metadata_map(&self) -> Map<String, Value> {
        let mut map = self.metadata.extra.clone();
        map.insert(
            "content".to_string(),
            Value::String(self.metadata.content.clone()),
        );
        map
    }
}

/// A vector fetched back by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVector {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<VectorData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl StoredVector {
    pub fn content(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
    }
}

/// A raw nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub return_metadata: bool,
    pub return_distance: bool,
}

impl QueryOptions {
    pub fn top_k(top_k: usize) -> Self {
        Self {
            top_k,
            return_metadata: false,
            return_distance: false,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self) -> Self {
        self.return_metadata = true;
        self
    }

    #[must_use]
    pub fn with_distance(mut self) -> Self {
        self.return_distance = true;
        self
    }
}

/// One page of a key listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn location(&self) -> IndexLocation;

    /// Creates the bucket, reporting [`CreateOutcome::AlreadyExists`] instead of failing when it's there.
    async fn create_bucket(&self) -> Result<CreateOutcome, VectorStoreError>;

    /// Creates a cosine index of the given dimension. A freshly created index
    /// is only returned once the store's readiness delay has elapsed.
    async fn create_index(&self, dimensions: usize) -> Result<CreateOutcome, VectorStoreError>;

    /// Upserts at most [`MAX_BATCH_SIZE`] records.
    async fn insert_documents(&self, records: &[StoreRecord]) -> Result<(), VectorStoreError>;

    /// Returns the records found among `keys`, in store order.
    async fn get_documents(&self, keys: &[String]) -> Result<Vec<StoredVector>, VectorStoreError>;

    async fn search_similar(
        &self,
        query: &[f32],
        options: QueryOptions,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Deletes by key. Keys that don't exist are a no-op; a missing bucket or
    /// index is an error.
    async fn delete_documents(&self, keys: &[String]) -> Result<(), VectorStoreError>;

    async fn list_vectors(
        &self,
        max_results: usize,
        next_token: Option<&str>,
    ) -> Result<ListPage, VectorStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        use VectorStoreError::*;
        assert_eq!(VectorStoreError::from_code(Some("NotFoundException"), "m"), NotFound("m".into()));
        assert_eq!(VectorStoreError::from_code(Some("ConflictException"), "m"), Conflict("m".into()));
        assert_eq!(
            VectorStoreError::from_code(Some("BucketAlreadyExists"), "m"),
            Conflict("m".into())
        );
        assert_eq!(
            VectorStoreError::from_code(Some("TooManyRequestsException"), "m"),
            Throttled("m".into())
        );
        assert_eq!(
            VectorStoreError::from_code(Some("AccessDeniedException"), "m"),
            Fatal("m".into())
        );
        assert_eq!(VectorStoreError::from_code(None, "m"), Fatal("m".into()));
        assert!(Throttled(String::new()).is_retryable());
        assert!(!Fatal(String::new()).is_retryable());
    }

    #[test]
    fn test_record_wire_format() {
        let mut extra = Map::new();
        extra.insert("batch".to_string(), Value::from(3));
        let record = StoreRecord::new("k".into(), vec![0.5, 0.25], "text".into(), extra);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "key": "k",
                "data": {"float32": [0.5, 0.25]},
                "metadata": {"content": "text", "batch": 3}
            })
        );
        assert_eq!(record.metadata_map().get("content"), Some(&Value::from("text")));
    }

    #[test]
    fn test_stored_vector_content() {
        let stored: StoredVector =
            serde_json::from_str(r#"{"key": "a", "metadata": {"content": "hi"}}"#).unwrap();
        assert_eq!(stored.content(), Some("hi"));
        assert!(stored.data.is_none());

        let bare: StoredVector = serde_json::from_str(r#"{"key": "b"}"#).unwrap();
        assert_eq!(bare.content(), None);
    }
}
