use crate::database::SearchHit;
use crate::gemini::GeminiClient;
use anyhow::Result;

/// A text completion backend
#[allow(async_fn_in_trait)]
pub trait LanguageModel {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt).await
    }
}

/// Join the descriptions of the matched awards, one per line
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.description.as_str())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Prompt asking the model to answer strictly from the retrieved context
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question based on only the following context:\n{}\nQuestion: {}",
        context, question
    )
}
