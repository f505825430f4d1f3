//! OpenAI-compatible chat completions client for text and image prompts.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TextModel, VisionModel, SYSTEM_PROMPT};
use crate::error::ServiceError;
use crate::models::config::ModelConfig;

/// Client for an OpenAI-compatible chat completions endpoint.
///
/// One client serves both the text and the vision model; only the model
/// name and the message content differ.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    text_model: String,
    vision_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Whether an API key is available.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    async fn chat(&self, model: &str, content: UserContent) -> Result<String, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("no API key set".to_string()))?;

        let start = Instant::now();
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: UserContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending chat request to {} ({})", self.api_base, model);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ServiceError::EmptyResponse)?;

        debug!(
            "{} replied with {} chars in {}ms",
            model,
            content.len(),
            start.elapsed().as_millis()
        );

        Ok(content)
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.text_model
    }

    async fn complete_text(&self, prompt: &str) -> Result<String, ServiceError> {
        self.chat(&self.text_model, UserContent::Text(prompt.to_string()))
            .await
    }
}

#[async_trait]
impl VisionModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.vision_model
    }

    async fn complete_vision(
        &self,
        image_b64: &str,
        mime_subtype: &str,
        prompt: &str,
    ) -> Result<String, ServiceError> {
        let content = UserContent::Parts(vec![
            ContentPart::Text {
                text: prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/{};base64,{}", mime_subtype, image_b64),
                },
            },
        ]);
        self.chat(&self.vision_model, content).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: UserContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}
