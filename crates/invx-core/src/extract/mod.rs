//! Structured field extraction.
//!
//! Extraction walks an ordered plan of [`Strategy`] values and stops at the
//! first one that produces a record. Model strategies can fail for many
//! reasons (no credentials, transport errors, timeouts, malformed replies);
//! those failures are recorded and the next strategy runs. The pattern and
//! placeholder strategies cannot fail, so every plan that ends in one of them
//! yields a well-formed record.

mod parser;
pub mod prompts;
pub mod response;
pub mod rules;

pub use parser::PatternParser;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::document::MediaKind;
use crate::error::{ServiceError, StrategyError};
use crate::llm::{encode_image, TextModel, VisionModel};
use crate::models::attempt::{ExtractionAttempt, StrategyFailure};
use crate::models::invoice::ExtractionResult;

/// One way of turning a document into an [`ExtractionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Send the image to a multimodal model.
    VisionModel,
    /// Send recognized text to a chat model.
    TextModel,
    /// Apply the deterministic rules.
    PatternBased,
    /// Synthesize a placeholder record.
    Placeholder,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VisionModel => "vision_model",
            Self::TextModel => "text_model",
            Self::PatternBased => "pattern_based",
            Self::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plan for a single image when no OCR engine is available.
pub const VISION_PLAN: &[Strategy] = &[Strategy::VisionModel, Strategy::Placeholder];

/// Plan for documents with recognized text.
pub const TEXT_PLAN: &[Strategy] = &[Strategy::TextModel, Strategy::PatternBased];

/// Plan for PDFs when no OCR engine is available.
pub const PLACEHOLDER_PLAN: &[Strategy] = &[Strategy::Placeholder];

/// What a strategy gets to look at.
#[derive(Debug, Clone, Copy)]
pub enum ExtractionInput<'a> {
    /// Recognized document text.
    Text(&'a str),
    /// Original image bytes and their type.
    Image { data: &'a [u8], kind: MediaKind },
}

impl ExtractionInput<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image { .. } => "image",
        }
    }
}

/// Runs extraction plans against the configured model services.
pub struct StructuredExtractor {
    text_model: Option<Arc<dyn TextModel>>,
    vision_model: Option<Arc<dyn VisionModel>>,
    parser: PatternParser,
    timeout: Duration,
}

impl StructuredExtractor {
    /// Create an extractor with no model services.
    pub fn new() -> Self {
        Self {
            text_model: None,
            vision_model: None,
            parser: PatternParser::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text_model = Some(model);
        self
    }

    pub fn with_vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.vision_model = Some(model);
        self
    }

    /// Set the deadline for a single model call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `plan` in order and return the first record produced.
    ///
    /// Never fails. If every strategy fails the record is all-null and the
    /// attempt has no winning strategy.
    pub async fn extract(
        &self,
        input: ExtractionInput<'_>,
        plan: &[Strategy],
    ) -> (ExtractionResult, ExtractionAttempt) {
        let mut attempt = ExtractionAttempt::default();

        for &strategy in plan {
            match self.run(strategy, input).await {
                Ok(result) => {
                    debug!(
                        "{} strategy produced {} fields",
                        strategy,
                        result.field_count()
                    );
                    attempt.strategy = Some(strategy);
                    return (result, attempt);
                }
                Err(err) => {
                    warn!("{} strategy failed: {}", strategy, err);
                    attempt.failures.push(StrategyFailure {
                        strategy,
                        reason: err.to_string(),
                    });
                }
            }
        }

        warn!("Extraction plan exhausted without a result");
        (ExtractionResult::default(), attempt)
    }

    /// Run a single strategy.
    pub async fn run(
        &self,
        strategy: Strategy,
        input: ExtractionInput<'_>,
    ) -> Result<ExtractionResult, StrategyError> {
        match strategy {
            Strategy::VisionModel => {
                let model = self
                    .vision_model
                    .as_ref()
                    .ok_or(StrategyError::Disabled("no vision model configured"))?;
                let ExtractionInput::Image { data, kind } = input else {
                    return Err(StrategyError::InputMismatch(input.describe()));
                };
                if !kind.is_image() {
                    return Err(StrategyError::InputMismatch("pdf"));
                }

                let image_b64 = encode_image(data);
                let prompt = prompts::vision_prompt();
                let reply = self
                    .call(model.complete_vision(&image_b64, kind.mime_subtype(), &prompt))
                    .await?;
                response::parse_model_reply(&reply)
            }
            Strategy::TextModel => {
                let model = self
                    .text_model
                    .as_ref()
                    .ok_or(StrategyError::Disabled("no text model configured"))?;
                let ExtractionInput::Text(text) = input else {
                    return Err(StrategyError::InputMismatch(input.describe()));
                };

                let reply = self.call(model.complete_text(&prompts::text_prompt(text))).await?;
                response::parse_model_reply(&reply)
            }
            Strategy::PatternBased => match input {
                ExtractionInput::Text(text) => Ok(self.parser.parse(text)),
                ExtractionInput::Image { .. } => Err(StrategyError::InputMismatch("image")),
            },
            Strategy::Placeholder => Ok(placeholder_result()),
        }
    }

    async fn call<F>(&self, request: F) -> Result<String, ServiceError>
    where
        F: Future<Output = Result<String, ServiceError>>,
    {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ServiceError::Timeout(self.timeout.as_secs()))?
    }
}

impl Default for StructuredExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Record returned when nothing could be read from the document.
///
/// Identifies itself through the `Unknown Vendor` name and a time-based
/// `INV-<epoch millis>` number; both dates are today (UTC).
pub fn placeholder_result() -> ExtractionResult {
    let now = Utc::now();
    ExtractionResult {
        vendor_name: Some("Unknown Vendor".to_string()),
        invoice_no: Some(format!("INV-{}", now.timestamp_millis())),
        amount: Some(Decimal::ZERO),
        invoice_date: Some(now.date_naive()),
        due_date: Some(now.date_naive()),
    }
}
