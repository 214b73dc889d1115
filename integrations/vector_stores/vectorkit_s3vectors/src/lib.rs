use async_trait::async_trait;
use aws_sdk_s3vectors::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{DataType, DistanceMetric, PutInputVector, VectorData as S3VectorData},
    Client,
};
use aws_smithy_types::{Document as SmithyDocument, Number};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use vectorkit::config::StoreConfig;
use vectorkit::vector_store::{
    CreateOutcome, IndexLocation, ListPage, QueryMatch, QueryOptions, StoreRecord, StoredVector,
    VectorData, VectorStore, VectorStoreError, MAX_LIST_PAGE_SIZE,
};

/// An [Amazon S3 Vectors](https://aws.amazon.com/s3/features/vectors/) store for use with vectorkit.
///
/// Credentials come from the standard AWS chain (environment, shared
/// config, instance/role credentials).
///
/// # Usage
///
/// ```rust,no_run
/// use vectorkit_s3vectors::S3VectorsStore;
///
/// # async fn run() -> Result<(), vectorkit::vector_store::VectorStoreError> {
/// let store = S3VectorsStore::new(Some(r#"{
///     "bucket_name": "my-vectors",
///     "index_name": "documents",
///     "region": "us-east-1"
/// }"#)).await?;
/// # Ok(())
/// # }
/// ```
pub struct S3VectorsStore {
    client: Client,
    config: StoreConfig,
}

impl S3VectorsStore {
    /// Creates a store from a JSON configuration string, or from the
    /// environment when none is given.
    ///
    /// # Errors
    /// This function will error if the JSON is malformed, contains unknown
    /// fields or leaves the bucket/index name empty.
    pub async fn new(config_json: Option<&str>) -> Result<Self, VectorStoreError> {
        let config = match config_json {
            Some(json) => StoreConfig::from_json(json)
                .map_err(|e| VectorStoreError::InvalidConfig(e.to_string()))?,
            None => StoreConfig::from_env(),
        };
        Ok(Self::from_config(config).await)
    }

    pub async fn from_config(config: StoreConfig) -> Self {
        let sdk_config = aws_config::from_env()
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;
        Self::with_client(Client::new(&sdk_config), config)
    }

    /// Wraps an already configured SDK client.
    pub fn with_client(client: Client, config: StoreConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    fn index(&self) -> &str {
        &self.config.index_name
    }
}

#[async_trait]
impl VectorStore for S3VectorsStore {
    fn location(&self) -> IndexLocation {
        IndexLocation {
            bucket: self.config.bucket_name.clone(),
            index: self.config.index_name.clone(),
            region: self.config.region.clone(),
        }
    }

    #[instrument(skip(self), fields(bucket = self.bucket()))]
    async fn create_bucket(&self) -> Result<CreateOutcome, VectorStoreError> {
        let result = self
            .client
            .create_vector_bucket()
            .vector_bucket_name(self.bucket())
            .send()
            .await;
        match result.map_err(into_vec_store_error) {
            Ok(_) => {
                info!("Created vector bucket");
                Ok(CreateOutcome::Created)
            }
            Err(VectorStoreError::Conflict(_)) => {
                info!("Vector bucket already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(bucket = self.bucket(), index = self.index()))]
    async fn create_index(&self, dimensions: usize) -> Result<CreateOutcome, VectorStoreError> {
        let dimension = i32::try_from(dimensions)
            .map_err(|_| VectorStoreError::Fatal(format!("dimension {dimensions} out of range")))?;
        let result = self
            .client
            .create_index()
            .vector_bucket_name(self.bucket())
            .index_name(self.index())
            .data_type(DataType::Float32)
            .dimension(dimension)
            .distance_metric(DistanceMetric::Cosine)
            .send()
            .await;
        match result.map_err(into_vec_store_error) {
            Ok(_) => {
                info!(dimensions, "Created vector index");
                tokio::time::sleep(Duration::from_millis(self.config.index_ready_delay_ms)).await;
                Ok(CreateOutcome::Created)
            }
            Err(VectorStoreError::Conflict(_)) => {
                info!("Vector index already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn insert_documents(&self, records: &[StoreRecord]) -> Result<(), VectorStoreError> {
        let vectors = records
            .iter()
            .map(put_input_vector)
            .collect::<Result<Vec<_>, _>>()?;
        self.client
            .put_vectors()
            .vector_bucket_name(self.bucket())
            .index_name(self.index())
            .set_vectors(Some(vectors))
            .send()
            .await
            .map_err(into_vec_store_error)
            .inspect_err(|e| warn!(error = %e, "Error inserting documents"))?;
        info!("Inserted documents");
        Ok(())
    }

    #[instrument(skip(self, keys), fields(count = keys.len()))]
    async fn get_documents(&self, keys: &[String]) -> Result<Vec<StoredVector>, VectorStoreError> {
        let output = self
            .client
            .get_vectors()
            .vector_bucket_name(self.bucket())
            .index_name(self.index())
            .set_keys(Some(keys.to_vec()))
            .return_data(true)
            .return_metadata(true)
            .send()
            .await
            .map_err(into_vec_store_error)?;
        Ok(output
            .vectors()
            .iter()
            .map(|v| StoredVector {
                key: v.key().to_string(),
                data: v.data().and_then(vector_data_from_s3),
                metadata: v.metadata().and_then(json_map_from_document),
            })
            .collect())
    }

    #[instrument(skip(self, query), fields(top_k = options.top_k))]
    async fn search_similar(
        &self,
        query: &[f32],
        options: QueryOptions,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let top_k = i32::try_from(options.top_k)
            .map_err(|_| VectorStoreError::Fatal(format!("top_k {} out of range", options.top_k)))?;
        let output = self
            .client
            .query_vectors()
            .vector_bucket_name(self.bucket())
            .index_name(self.index())
            .query_vector(S3VectorData::Float32(query.to_vec()))
            .top_k(top_k)
            .return_metadata(options.return_metadata)
            .return_distance(options.return_distance)
            .send()
            .await
            .map_err(into_vec_store_error)?;
        debug!(results = output.vectors().len(), "Query completed");
        Ok(output
            .vectors()
            .iter()
            .map(|v| QueryMatch {
                key: v.key().to_string(),
                metadata: v.metadata().and_then(json_map_from_document),
                distance: v.distance(),
            })
            .collect())
    }

    #[instrument(skip(self, keys), fields(count = keys.len()))]
    async fn delete_documents(&self, keys: &[String]) -> Result<(), VectorStoreError> {
        // the service accepts unknown keys, so NotFound means the bucket or index is gone
        self.client
            .delete_vectors()
            .vector_bucket_name(self.bucket())
            .index_name(self.index())
            .set_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(into_vec_store_error)
            .inspect_err(|e| warn!(error = %e, "Error deleting documents"))?;
        info!("Deleted documents");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_vectors(
        &self,
        max_results: usize,
        next_token: Option<&str>,
    ) -> Result<ListPage, VectorStoreError> {
        let max_results = max_results.clamp(1, MAX_LIST_PAGE_SIZE) as i32;
        let output = self
            .client
            .list_vectors()
            .vector_bucket_name(self.bucket())
            .index_name(self.index())
            .max_results(max_results)
            .set_next_token(next_token.map(ToString::to_string))
            .send()
            .await
            .map_err(into_vec_store_error)?;
        Ok(ListPage {
            keys: output.vectors().iter().map(|v| v.key().to_string()).collect(),
            next_token: output.next_token().map(ToString::to_string),
        })
    }
}

fn put_input_vector(record: &StoreRecord) -> Result<PutInputVector, VectorStoreError> {
    PutInputVector::builder()
        .key(&record.key)
        .data(S3VectorData::Float32(record.data.float32.clone()))
        .metadata(document_from_json(&Value::Object(record.metadata_map())))
        .build()
        .map_err(|e| VectorStoreError::Fatal(e.to_string()))
}

fn vector_data_from_s3(data: &S3VectorData) -> Option<VectorData> {
    data.as_float32().ok().map(|float32| VectorData {
        float32: float32.clone(),
    })
}

fn into_vec_store_error<E, R>(e: SdkError<E, R>) -> VectorStoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&e).to_string();
    match &e {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            VectorStoreError::Throttled(message)
        }
        _ => VectorStoreError::from_code(e.as_service_error().and_then(|s| s.code()), message),
    }
}

fn document_from_json(value: &Value) -> SmithyDocument {
    match value {
        Value::Null => SmithyDocument::Null,
        Value::Bool(b) => SmithyDocument::Bool(*b),
        Value::Number(n) => SmithyDocument::Number(if let Some(u) = n.as_u64() {
            Number::PosInt(u)
        } else if let Some(i) = n.as_i64() {
            Number::NegInt(i)
        } else {
            Number::Float(n.as_f64().unwrap_or_default())
        }),
        Value::String(s) => SmithyDocument::String(s.clone()),
        Value::Array(items) => SmithyDocument::Array(items.iter().map(document_from_json).collect()),
        Value::Object(map) => SmithyDocument::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_from_json(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

fn json_from_document(document: &SmithyDocument) -> Value {
    match document {
        SmithyDocument::Null => Value::Null,
        SmithyDocument::Bool(b) => Value::Bool(*b),
        SmithyDocument::Number(Number::PosInt(u)) => Value::from(*u),
        SmithyDocument::Number(Number::NegInt(i)) => Value::from(*i),
        SmithyDocument::Number(Number::Float(f)) => Value::from(*f),
        SmithyDocument::String(s) => Value::String(s.clone()),
        SmithyDocument::Array(items) => Value::Array(items.iter().map(json_from_document).collect()),
        SmithyDocument::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_from_document(v)))
                .collect(),
        ),
    }
}

fn json_map_from_document(document: &SmithyDocument) -> Option<Map<String, Value>> {
    match json_from_document(document) {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3vectors::error::ErrorMetadata;
    use aws_sdk_s3vectors::operation::delete_vectors::DeleteVectorsError;
    use serde_json::json;
    use vectorkit::document::{Document, EMBEDDING_DIMENSIONS};
    use vectorkit::manager::VectorStoreManager;

    #[test]
    fn test_metadata_conversion() {
        let metadata = json!({
            "content": "Performance test document 7",
            "batch": 3,
            "offset": -2,
            "timestamp": 1_720_000_000.5,
            "tags": ["a", "b"],
            "nested": {"ok": true, "none": null}
        });
        let document = document_from_json(&metadata);

        let SmithyDocument::Object(ref fields) = document else {
            panic!("expected an object document");
        };
        assert_eq!(fields.get("batch"), Some(&SmithyDocument::Number(Number::PosInt(3))));
        assert_eq!(fields.get("offset"), Some(&SmithyDocument::Number(Number::NegInt(-2))));
        assert_eq!(json_from_document(&document), metadata);
        assert!(json_map_from_document(&SmithyDocument::String("x".into())).is_none());
    }

    #[test]
    fn test_put_input_vector() {
        let record = Document::create("hello", None).unwrap().to_store_record();
        let vector = put_input_vector(&record).unwrap();
        assert_eq!(vector.key(), record.key);
        assert_eq!(
            vector.data().and_then(vector_data_from_s3).map(|d| d.float32.len()),
            Some(EMBEDDING_DIMENSIONS)
        );
        let metadata = json_map_from_document(vector.metadata()).unwrap();
        assert_eq!(metadata.get("content"), Some(&Value::from("hello")));
    }

    #[test]
    fn test_missing_index_maps_to_not_found() {
        let err = DeleteVectorsError::generic(
            ErrorMetadata::builder()
                .code("NotFoundException")
                .message("index does not exist")
                .build(),
        );
        let mapped = into_vec_store_error(SdkError::service_error(err, ()));
        assert!(matches!(mapped, VectorStoreError::NotFound(_)));
        assert!(!mapped.is_retryable());
    }

    #[tokio::test]
    async fn test_new_rejects_unknown_fields() {
        let result = S3VectorsStore::new(Some(r#"{"bucket_name": "b", "index_name": "i", "idx": 1}"#)).await;
        assert!(matches!(result, Err(VectorStoreError::InvalidConfig(_))));
    }

    async fn live_store() -> S3VectorsStore {
        let index = std::env::var("S3_VECTORS_TEST_INDEX_NAME").unwrap_or("test-documents".to_string());
        let config = StoreConfig::from_env().with_index_name(index);
        S3VectorsStore::from_config(config).await
    }

    #[tokio::test]
    #[ignore]
    async fn test_s3vectors_lifecycle() {
        let store = live_store().await;
        assert!(store.create_bucket().await.is_ok());
        assert!(store.create_index(EMBEDDING_DIMENSIONS).await.is_ok());
        assert_eq!(
            store.create_index(EMBEDDING_DIMENSIONS).await,
            Ok(CreateOutcome::AlreadyExists)
        );

        let doc = Document::create("Hello from S3 Vectors!", None).unwrap();
        store.insert_documents(&[doc.to_store_record()]).await.unwrap();

        let fetched = store.get_documents(&[doc.key().to_string()]).await.unwrap();
        assert_eq!(fetched[0].content(), Some("Hello from S3 Vectors!"));

        let matches = store
            .search_similar(doc.embedding(), QueryOptions::top_k(2).with_metadata().with_distance())
            .await
            .unwrap();
        assert!(matches.len() <= 2);
        assert!(matches.iter().all(|m| m.distance.is_some()));

        store.delete_documents(&[doc.key().to_string()]).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_s3vectors_document_count() {
        let manager = VectorStoreManager::new(std::sync::Arc::new(live_store().await));
        assert!(manager.get_document_count().await.is_ok());
    }
}
