use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BUCKET_ENV_VAR: &str = "S3_VECTORS_BUCKET_NAME";
pub const INDEX_ENV_VAR: &str = "S3_VECTORS_INDEX_NAME";
pub const REGION_ENV_VARS: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

const DEFAULT_BUCKET: &str = "s3-vectors-demo";
const DEFAULT_INDEX: &str = "documents";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_INDEX_READY_DELAY_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to deserialize json config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which bucket and index a vector store talks to.
///
/// ```json
/// {
///     "bucket_name": "my-vectors",
///     "index_name": "documents",
///     "region": "eu-west-1",
///     "index_ready_delay_ms": 2000
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub bucket_name: String,
    pub index_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Pause after creating an index, before it is assumed queryable.
    #[serde(default = "default_index_ready_delay_ms")]
    pub index_ready_delay_ms: u64,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_index_ready_delay_ms() -> u64 {
    DEFAULT_INDEX_READY_DELAY_MS
}

impl StoreConfig {
    pub fn new(bucket_name: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            index_name: index_name.into(),
            region: default_region(),
            index_ready_delay_ms: DEFAULT_INDEX_READY_DELAY_MS,
        }
    }

    /// Parses a JSON config, rejecting unknown fields and empty names.
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed JSON or an empty bucket/index name.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `S3_VECTORS_BUCKET_NAME`, `S3_VECTORS_INDEX_NAME` and
    /// `AWS_REGION`/`AWS_DEFAULT_REGION`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            bucket_name: non_empty(BUCKET_ENV_VAR).unwrap_or(DEFAULT_BUCKET.to_string()),
            index_name: non_empty(INDEX_ENV_VAR).unwrap_or(DEFAULT_INDEX.to_string()),
            region: REGION_ENV_VARS
                .iter()
                .find_map(|name| non_empty(*name))
                .unwrap_or_else(default_region),
            index_ready_delay_ms: DEFAULT_INDEX_READY_DELAY_MS,
        }
    }

    #[must_use]
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_name.trim().is_empty() {
            return Err(ConfigError::Invalid("`bucket_name` must not be empty".to_string()));
        }
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::Invalid("`index_name` must not be empty".to_string()));
        }
        Ok(())
    }
}
