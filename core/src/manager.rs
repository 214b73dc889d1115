use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::{
    document::Document,
    error::Result,
    vector_store::{
        QueryMatch, QueryOptions, StoredVector, VectorStore, VectorStoreError, MAX_BATCH_SIZE,
        MAX_LIST_PAGE_SIZE,
    },
};

/// Content reported for matches stored without a `content` metadata field.
pub const MISSING_CONTENT: &str = "N/A";

/// How far [`VectorStoreManager::delete_all_documents`] reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteAllScope {
    /// Delete whatever a single listing page returns. Indexes holding more
    /// than one page keep the remainder.
    #[default]
    FirstPage,
    /// Follow continuation tokens and delete every key.
    AllPages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ManagerConfig {
    pub list_page_size: usize,
    pub delete_all_scope: DeleteAllScope,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            list_page_size: MAX_LIST_PAGE_SIZE,
            delete_all_scope: DeleteAllScope::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedDocument {
    pub id: String,
    pub content: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub key: String,
    pub content: String,
    pub distance: Option<f32>,
    pub metadata: Map<String, Value>,
}

impl From<QueryMatch> for SearchResult {
    fn from(m: QueryMatch) -> Self {
        let metadata = m.metadata.unwrap_or_default();
        let content = metadata
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or(MISSING_CONTENT)
            .to_string();
        Self {
            key: m.key,
            content,
            distance: m.distance,
            metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub bucket: String,
    pub index: String,
    pub region: String,
    pub document_count: usize,
}

/// User-facing document workflows over a [`VectorStore`].
#[derive(Clone)]
pub struct VectorStoreManager {
    store: Arc<dyn VectorStore>,
    config: ManagerConfig,
}

impl VectorStoreManager {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    pub fn with_config(store: Arc<dyn VectorStore>, config: ManagerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Wraps `content` and `embedding` in a new [`Document`] and inserts it.
    ///
    /// # Errors
    /// Fails on an embedding of the wrong dimension or a store failure.
    #[instrument(skip(self, content, embedding))]
    pub async fn add_document(
        &self,
        content: &str,
        embedding: Vec<f32>,
    ) -> Result<AddedDocument> {
        let doc = Document::create(content, Some(embedding))?;
        self.store
            .insert_documents(&[doc.to_store_record()])
            .await
            .inspect_err(|e| error!(error = %e, "Error inserting document"))?;
        info!(key = doc.key(), "Added document");
        Ok(AddedDocument {
            id: doc.key().to_string(),
            content: content.to_string(),
            success: true,
        })
    }

    /// Fetches up to `limit` full records: one listing page for the keys,
    /// then a lookup for their data and metadata.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn list_documents(&self, limit: usize) -> Result<Vec<StoredVector>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let page = self
            .store
            .list_vectors(limit, None)
            .await
            .inspect_err(|e| error!(error = %e, "Error listing documents"))?;
        if page.keys.is_empty() {
            return Ok(vec![]);
        }
        let documents = self
            .store
            .get_documents(&page.keys)
            .await
            .inspect_err(|e| error!(error = %e, "Error retrieving documents"))?;
        Ok(documents)
    }

    /// Nearest-neighbour search, projecting each match into a [`SearchResult`].
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, query), fields(sample = ?&query[..query.len().min(5)]))]
    pub async fn search_documents(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let matches = self
            .store
            .search_similar(query, QueryOptions::top_k(top_k).with_metadata().with_distance())
            .await
            .inspect_err(|e| error!(error = %e, "Error searching documents"))?;
        debug!(results = matches.len(), "Search completed");

        Ok(matches.into_iter().map(SearchResult::from).collect())
    }

    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn delete_document(&self, key: &str) -> Result<()> {
        self.store
            .delete_documents(&[key.to_string()])
            .await
            .inspect_err(|e| error!(error = %e, "Error deleting document"))?;
        Ok(())
    }

    /// Deletes the documents reachable under the configured [`DeleteAllScope`]
    /// and returns how many keys were deleted.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self), fields(scope = ?self.config.delete_all_scope))]
    pub async fn delete_all_documents(&self) -> Result<usize> {
        let keys = match self.config.delete_all_scope {
            DeleteAllScope::FirstPage => {
                self.store
                    .list_vectors(self.config.list_page_size, None)
                    .await
                    .inspect_err(|e| error!(error = %e, "Error deleting all documents"))?
                    .keys
            }
            DeleteAllScope::AllPages => self.list_all_keys().await?,
        };
        for chunk in keys.chunks(MAX_BATCH_SIZE) {
            self.store
                .delete_documents(chunk)
                .await
                .inspect_err(|e| error!(error = %e, "Error deleting all documents"))?;
        }
        info!(deleted = keys.len(), "Deleted documents");
        Ok(keys.len())
    }

    /// Counts every document by following continuation tokens to the end.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn get_document_count(&self) -> Result<usize> {
        Ok(self.list_all_keys().await?.len())
    }

    /// # Errors
    /// Propagates store failures from counting.
    pub async fn get_index_info(&self) -> Result<IndexInfo> {
        let location = self.store.location();
        Ok(IndexInfo {
            bucket: location.bucket,
            index: location.index,
            region: location.region,
            document_count: self.get_document_count().await?,
        })
    }

    async fn list_all_keys(&self) -> std::result::Result<Vec<String>, VectorStoreError> {
        let mut keys = vec![];
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_vectors(self.config.list_page_size, next_token.as_deref())
                .await
                .inspect_err(|e| error!(error = %e, "Error listing documents"))?;
            keys.extend(page.keys);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }
}
