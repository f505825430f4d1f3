//! Model service seams for the extraction cascade.
//!
//! The extractor only talks to [`TextModel`] and [`VisionModel`]; the
//! OpenAI-compatible client implements both, tests plug in stand-ins.

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ServiceError;

/// System message sent with every completion request.
pub const SYSTEM_PROMPT: &str =
    "You are an invoice data extraction assistant. Return only valid JSON.";

/// A chat model that completes a text prompt.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Complete `prompt` and return the raw reply text.
    async fn complete_text(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// A multimodal model that reads an image alongside a prompt.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Complete `prompt` over a base64 image of type `image/<mime_subtype>`.
    async fn complete_vision(
        &self,
        image_b64: &str,
        mime_subtype: &str,
        prompt: &str,
    ) -> Result<String, ServiceError>;
}

/// Base64-encode raw image bytes for a vision request.
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
