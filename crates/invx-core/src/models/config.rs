//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Main configuration for the invx pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvxConfig {
    /// Document rendering configuration.
    pub render: RenderConfig,

    /// Image enhancement configuration.
    pub enhance: EnhanceConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Vision/text model service configuration.
    pub models: ModelConfig,

    /// Extraction cascade configuration.
    pub extraction: ExtractionConfig,
}

/// How PDF pages are turned into raster images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterBackend {
    /// Use `pdftoppm` when available, embedded images otherwise.
    Auto,
    /// Always rasterize with `pdftoppm`.
    Poppler,
    /// Decode the largest embedded image on each page. Pages without one
    /// cannot be rendered.
    Embedded,
}

/// Document rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// DPI for rendering PDF pages to images.
    pub dpi: u32,

    /// Rasterizer for PDF pages.
    pub backend: RasterBackend,

    /// Path or name of the `pdftoppm` binary.
    pub pdftoppm_path: PathBuf,

    /// Maximum pages to render (0 = unlimited).
    pub max_pages: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            backend: RasterBackend::Auto,
            pdftoppm_path: PathBuf::from("pdftoppm"),
            max_pages: 0,
        }
    }
}

/// Image enhancement configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Run the enhancer at all.
    pub enabled: bool,

    /// Contrast multiplier around the mean luminance.
    pub contrast_factor: f32,

    /// Apply the 3x3 sharpening convolution.
    pub sharpen: bool,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            contrast_factor: 2.0,
            sharpen: true,
        }
    }
}

/// OCR engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngineKind {
    /// Tesseract command-line engine.
    Tesseract,
    /// `pure-onnx-ocr` models (requires the `onnx` feature).
    Onnx,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Engine to use.
    pub engine: OcrEngineKind,

    /// Path or name of the `tesseract` binary.
    pub tesseract_path: PathBuf,

    /// Tesseract language pack.
    pub language: String,

    /// Tesseract page segmentation mode.
    pub page_segmentation_mode: u8,

    /// Tesseract OCR engine mode.
    pub engine_mode: u8,

    /// Directory with `det.onnx`, `latin_rec.onnx` and `latin_dict.txt`.
    pub model_dir: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Tesseract,
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            // Single uniform block: invoices are label/value blocks, not prose.
            page_segmentation_mode: 6,
            engine_mode: 3,
            model_dir: PathBuf::from("models"),
        }
    }
}

/// Vision/text model service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,

    /// API key. Usually supplied through `OPENAI_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for text extraction.
    pub text_model: String,

    /// Model used for vision extraction.
    pub vision_model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Completion token limit.
    pub max_tokens: u32,

    /// Caller-side timeout per request, in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            text_model: "gpt-3.5-turbo".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            timeout_secs: 30,
        }
    }
}

impl ModelConfig {
    /// Whether credentials are present.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Extraction cascade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Try the text model before the pattern rules.
    pub enable_text_model: bool,

    /// Try the vision model when no OCR engine is available.
    pub enable_vision_model: bool,

    /// Number of characters of recognized text echoed in the response.
    pub diagnostic_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enable_text_model: true,
            enable_vision_model: true,
            diagnostic_chars: 1000,
        }
    }
}

impl InvxConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `OPENAI_API_KEY`, `INVX_API_BASE` and `TESSERACT_CMD` from the
    /// process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.models.api_key = Some(key);
        }
        if let Some(base) = lookup("INVX_API_BASE").filter(|v| !v.trim().is_empty()) {
            self.models.api_base = base;
        }
        if let Some(cmd) = lookup("TESSERACT_CMD").filter(|v| !v.trim().is_empty()) {
            self.ocr.tesseract_path = PathBuf::from(cmd);
        }
        self
    }

    /// Disable both model strategies, leaving OCR and pattern rules.
    pub fn offline(mut self) -> Self {
        self.extraction.enable_text_model = false;
        self.extraction.enable_vision_model = false;
        self
    }
}
