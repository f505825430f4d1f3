//! Error types for the invx-core library.

use thiserror::Error;

/// Errors surfaced to callers of the extraction pipeline.
///
/// Every variant is a client-facing failure. Strategy failures inside the
/// extraction cascade never reach this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The declared media type is not one of PDF, JPEG or PNG.
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// The document could not be decoded or rasterized.
    #[error("failed to render document: {0}")]
    Render(String),

    /// The OCR engine ran but produced no text.
    #[error("no text could be extracted from the file: {0}")]
    NoTextExtracted(String),
}

impl PipelineError {
    /// Whether the caller should report this as a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMedia(_) | Self::Render(_) | Self::NoTextExtracted(_)
        )
    }

    /// Stable short name for logs and CLI summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedMedia(_) => "unsupported_media",
            Self::Render(_) => "render",
            Self::NoTextExtracted(_) => "no_text_extracted",
        }
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<lopdf::Error> for PipelineError {
    fn from(err: lopdf::Error) -> Self {
        Self::Render(format!("invalid PDF: {}", err))
    }
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The engine binary or model files cannot be reached.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// Recognition of a single page failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Failed to hand the image to the engine.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// I/O error talking to the engine process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the vision and text model services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No credentials or endpoint configured.
    #[error("model service not configured: {0}")]
    NotConfigured(String),

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP 429 from the service.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The caller-side timeout elapsed.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The response carried no completion text.
    #[error("empty response from model")]
    EmptyResponse,

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failure of a single strategy in the extraction cascade.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// No service is wired up for this strategy.
    #[error("strategy disabled: {0}")]
    Disabled(&'static str),

    /// The strategy cannot handle this kind of input.
    #[error("strategy does not accept {0} input")]
    InputMismatch(&'static str),

    /// The model service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The model answered with something that is not the expected JSON.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error reading or writing the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid configuration JSON.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
