//! Text recognition over rendered pages.

#[cfg(feature = "onnx")]
mod onnx;
mod tesseract;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;
pub use tesseract::TesseractEngine;

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::document::PageImage;
use crate::error::OcrError;
use crate::models::attempt::OcrStatus;
use crate::models::config::{OcrConfig, OcrEngineKind};

/// Separator placed between the text of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n";

/// An OCR backend.
pub trait OcrEngine: Send + Sync {
    /// Engine name, for logs and reports.
    fn name(&self) -> &str;

    /// Check that the engine can run at all.
    fn check_available(&self) -> Result<(), OcrError>;

    /// Recognize the text of a single page.
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Placeholder engine that is never available.
pub struct UnavailableEngine {
    reason: String,
}

impl UnavailableEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl OcrEngine for UnavailableEngine {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn check_available(&self) -> Result<(), OcrError> {
        Err(OcrError::Unavailable(self.reason.clone()))
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Err(OcrError::Unavailable(self.reason.clone()))
    }
}

/// Build the engine selected in the configuration.
pub fn create_engine(config: &OcrConfig) -> Arc<dyn OcrEngine> {
    match config.engine {
        OcrEngineKind::Tesseract => Arc::new(TesseractEngine::new(config)),
        #[cfg(feature = "onnx")]
        OcrEngineKind::Onnx => Arc::new(OnnxEngine::new(&config.model_dir)),
        #[cfg(not(feature = "onnx"))]
        OcrEngineKind::Onnx => Arc::new(UnavailableEngine::new(
            "built without the `onnx` feature",
        )),
    }
}

/// Text recognized from all pages of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedText {
    /// Page texts joined with [`PAGE_SEPARATOR`], in page order.
    pub text: String,
    /// Per-page text, in page order.
    pub pages: Vec<String>,
    /// Page numbers whose recognition failed.
    pub failed_pages: Vec<u32>,
}

impl RecognizedText {
    pub fn from_pages(pages: Vec<String>, failed_pages: Vec<u32>) -> Self {
        Self {
            text: pages.join(PAGE_SEPARATOR),
            pages,
            failed_pages,
        }
    }

    /// True when nothing but whitespace was recognized.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Outcome of running OCR over a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// The engine ran; the text may still be empty.
    Text(RecognizedText),
    /// No engine could be invoked.
    Unavailable { reason: String },
}

impl Recognition {
    /// OCR status to report for this outcome.
    pub fn status(&self) -> OcrStatus {
        match self {
            Self::Text(text) if text.is_blank() => OcrStatus::Empty,
            Self::Text(_) => OcrStatus::Text,
            Self::Unavailable { .. } => OcrStatus::Unavailable,
        }
    }
}

/// Runs an [`OcrEngine`] over every page of a document.
#[derive(Clone)]
pub struct TextRecognizer {
    engine: Arc<dyn OcrEngine>,
}

impl TextRecognizer {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(create_engine(config))
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Check engine availability without recognizing anything.
    pub fn check_available(&self) -> Result<(), OcrError> {
        self.engine.check_available()
    }

    /// Recognize all pages in order.
    ///
    /// A page that fails contributes an empty string; the others still run.
    pub fn recognize(&self, pages: &[PageImage]) -> Recognition {
        if let Err(e) = self.engine.check_available() {
            info!("OCR engine {} unavailable: {}", self.engine.name(), e);
            return Recognition::Unavailable {
                reason: e.to_string(),
            };
        }

        let start = Instant::now();
        let mut texts = Vec::with_capacity(pages.len());
        let mut failed = Vec::new();

        for page in pages {
            match self.engine.recognize(&page.image) {
                Ok(text) => {
                    debug!("Page {}: {} chars", page.page_number, text.len());
                    texts.push(text);
                }
                Err(e) => {
                    warn!("OCR failed on page {}: {}", page.page_number, e);
                    failed.push(page.page_number);
                    texts.push(String::new());
                }
            }
        }

        let recognized = RecognizedText::from_pages(texts, failed);
        info!(
            "{} recognized {} page(s), {} chars in {}ms",
            self.engine.name(),
            pages.len(),
            recognized.text.len(),
            start.elapsed().as_millis()
        );

        Recognition::Text(recognized)
    }
}
