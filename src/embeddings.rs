use crate::gemini::{Embedding, GeminiClient};
use anyhow::Result;

/// Anything that can turn a piece of text into a vector
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Embed a single input string
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.get_embedding(text).await
    }
}
