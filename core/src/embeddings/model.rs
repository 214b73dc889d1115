use crate::embeddings::EmbedderError;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, data: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embeds every input, returning one vector per input in the same order.
    async fn embed_batch(&self, data: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut embeddings = Vec::with_capacity(data.len());
        for text in data {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}
