mod openai;

pub use openai::OpenAIEmbeddingModel;
