use crate::document::EMBEDDING_DIMENSIONS;
use crate::embeddings::{model::EmbeddingModel, EmbedderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, instrument};

const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
const URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
}

/// [OpenAI](https://platform.openai.com/docs/api-reference/embeddings) embeddings,
/// requested at a reduced output dimension.
///
/// # Supported Configuration
///
/// - `model`(optional): defaults to `text-embedding-3-small`
/// - `api_key_var`(optional): env var holding the API key, defaults to `OPENAI_API_KEY`
/// - `api_url`(optional): custom API endpoint URL
/// - `dimensions`(optional): output dimension, defaults to 128
///
/// ```rust,no_run
/// use vectorkit::providers::embeddings::OpenAIEmbeddingModel;
///
/// let model = OpenAIEmbeddingModel::new(Some(r#"{"model": "text-embedding-3-small"}"#))?;
/// # Ok::<(), vectorkit::embeddings::EmbedderError>(())
/// ```
pub struct OpenAIEmbeddingModel {
    api_key: String,
    api_url: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OpenAIEmbeddingModel {
    /// Creates the model from an optional JSON config, reading the API key
    /// from the configured environment variable.
    ///
    /// # Errors
    /// Fails when the JSON is malformed or has unknown fields, or when the
    /// API key variable isn't set.
    #[instrument]
    pub fn new(json_config: Option<&str>) -> Result<Self, EmbedderError> {
        let config = match json_config {
            Some(json) => serde_json::from_str::<ModelConfig>(json).map_err(|e| {
                let e = format!("Failed to deserialize json config: {e}");
                error!("{e}");
                EmbedderError::InvalidConfig(e)
            })?,
            None => ModelConfig::default(),
        };
        let api_key_var = config.api_key_var.unwrap_or(API_KEY_ENV_VAR.to_string());
        let api_key = std::env::var(&api_key_var).map_err(|e| {
            let e = format!("Failed to fetch env var `{api_key_var}`!, {e}");
            error!("{e}");
            EmbedderError::InvalidConfig(e)
        })?;
        Ok(Self {
            api_key,
            api_url: config.api_url.unwrap_or(URL.to_string()),
            model: config.model.unwrap_or(DEFAULT_MODEL.to_string()),
            dimensions: config.dimensions.unwrap_or(EMBEDDING_DIMENSIONS),
            client: Client::new(),
        })
    }

    /// Creates the model with an explicit key and endpoint.
    pub fn with_api_key(api_key: String, api_url: String, model: String) -> Self {
        Self {
            api_key,
            api_url,
            model,
            dimensions: EMBEDDING_DIMENSIONS,
            client: Client::new(),
        }
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let request_body = json!({
            "input": input,
            "model": self.model,
            "dimensions": self.dimensions,
        });
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| EmbedderError::RequestError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let response = response
                .json::<OpenAIEmbeddingResponse>()
                .await
                .map_err(|e| EmbedderError::ParseError(e.to_string()))?;
            debug!(count = response.data.len(), "Received embeddings");

            let mut data = response.data;
            data.sort_by_key(|d| d.index);
            Ok(data.into_iter().map(|d| d.embedding).collect())
        } else {
            let error_message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(EmbedderError::ProviderError(status.as_u16(), error_message))
        }
    }
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    pub data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
    async fn embed(&self, data: &str) -> Result<Vec<f32>, EmbedderError> {
        self.request(json!(data))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedderError::ParseError("Response carried no embedding".to_string()))
    }

    async fn embed_batch(&self, data: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        self.request(json!(data)).await
    }
}
