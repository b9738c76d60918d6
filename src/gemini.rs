use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
const DEFAULT_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Configuration for Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model named in every embedding request body, e.g. `models/text-embedding-004`
    pub embedding_model: String,
    pub embeddings_url: String,
    pub generate_url: String,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")?;
        let embedding_model = env::var("GEMINI_EMBEDDING_MODEL")
            .map(|model| qualified_model_name(&model))
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        // An explicit URL wins; otherwise it follows the configured model.
        let embeddings_url = env::var("GEMINI_EMBEDDINGS_URL")
            .unwrap_or_else(|_| embeddings_url_for(&embedding_model));
        let generate_url =
            env::var("GEMINI_GENERATE_URL").unwrap_or_else(|_| DEFAULT_GENERATE_URL.to_string());

        Ok(GeminiConfig {
            api_key,
            embedding_model,
            embeddings_url,
            generate_url,
        })
    }
}

/// Request bodies name models as `models/<id>`
pub fn qualified_model_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// Default `embedContent` endpoint for a model name
pub fn embeddings_url_for(model: &str) -> String {
    let model = model.trim_start_matches("models/");
    format!("{}/models/{}:embedContent", API_BASE_URL, model)
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest::new(&self.config.embedding_model, text);

        let url = format!("{}?key={}", self.config.embeddings_url, self.config.api_key);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Embedding request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: EmbeddingResponse = response.json().await?;

        Ok(Embedding {
            values: response_data.embedding.values,
        })
    }

    /// Generate text for a complete prompt
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let url = format!("{}?key={}", self.config.generate_url, self.config.api_key);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Generation request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: GenerateResponse = response.json().await?;

        response_data.into_text()
    }
}

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

// Request/response structures for the Gemini REST API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: EmbeddingContent<'a>,
}

impl<'a> EmbeddingRequest<'a> {
    fn new(model: &'a str, text: &'a str) -> Self {
        EmbeddingRequest {
            model,
            content: EmbeddingContent {
                parts: vec![Part { text }],
            },
        }
    }
}

#[derive(Serialize)]
struct EmbeddingContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role,
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Extract the generated text from the first candidate
    fn into_text(self) -> Result<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
