//! OpenAI-compatible HTTP adapter for embeddings and image description.

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{DescriptionOutcome, EmbeddingError, EmbeddingProvider, ImageDescriber};
use crate::config::Config;
use crate::models::Description;

const DESCRIBE_PROMPT: &str = "Return JSON with keys: objects, colors, shapes, materials, setting. \
     objects, colors, shapes and materials are arrays of short lowercase words; \
     setting is one short phrase.";
const DESCRIBE_MAX_TOKENS: u32 = 256;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    embedding_model: String,
    vision_model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        embedding_model: impl Into<String>,
        vision_model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            embedding_model: embedding_model.into(),
            vision_model: vision_model.into(),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.openai_base_url,
            config.openai_api_key.clone(),
            &config.embedding_model,
            &config.vision_model,
        )
    }

    fn post(&self, path: &str) -> Option<reqwest::RequestBuilder> {
        let key = self.api_key.as_ref()?;
        Some(
            self.client
                .post(format!("{}{}", self.base_url, path))
                .bearer_auth(key),
        )
    }

    /// Turn an image reference into something the vision endpoint accepts:
    /// remote URLs pass through, local files become a base64 data URL.
    async fn image_url(&self, image_ref: &str) -> Result<String, String> {
        if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
            return Ok(image_ref.to_string());
        }

        let bytes = tokio::fs::read(image_ref)
            .await
            .map_err(|e| format!("cannot read image {}: {}", image_ref, e))?;
        if bytes.is_empty() {
            return Err(format!("image {} is empty", image_ref));
        }

        Ok(format!(
            "data:{};base64,{}",
            mime_for(Path::new(image_ref)),
            general_purpose::STANDARD.encode(&bytes)
        ))
    }

    async fn request_description(&self, image_url: String) -> Result<String, String> {
        let request = self
            .post("/chat/completions")
            .ok_or_else(|| "no API key configured for the vision provider".to_string())?;

        let response = request
            .json(&json!({
                "model": self.vision_model,
                "max_tokens": DESCRIBE_MAX_TOKENS,
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": DESCRIBE_PROMPT },
                        { "type": "image_url", "image_url": { "url": image_url } }
                    ]
                }]
            }))
            .send()
            .await
            .map_err(|e| format!("vision request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("vision provider returned {}: {}", status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed vision response: {}", e))?;
        message_content(chat).ok_or_else(|| "vision response had no content".to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = self
            .post("/embeddings")
            .ok_or(EmbeddingError::MissingApiKey)?;

        let response = request
            .json(&json!({
                "model": self.embedding_model,
                "input": text,
                "encoding_format": "float"
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        first_embedding(response.json().await?)
    }
}

#[async_trait]
impl ImageDescriber for OpenAiClient {
    async fn describe(&self, image_ref: &str) -> DescriptionOutcome {
        let image_url = match self.image_url(image_ref).await {
            Ok(url) => url,
            Err(reason) => return DescriptionOutcome::fallback(reason),
        };

        let content = match self.request_description(image_url).await {
            Ok(content) => content,
            Err(reason) => return DescriptionOutcome::fallback(reason),
        };

        match Description::from_json(&content) {
            Ok(description) => DescriptionOutcome::Described(description),
            Err(e) => DescriptionOutcome::fallback(format!("unparseable description: {}", e)),
        }
    }
}

fn first_embedding(response: EmbeddingResponse) -> Result<Vec<f32>, EmbeddingError> {
    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|e| !e.is_empty())
        .ok_or(EmbeddingError::EmptyResponse)
}

fn message_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
