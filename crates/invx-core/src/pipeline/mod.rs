//! End-to-end invoice extraction.
//!
//! ```text
//! Received -> Rendered -> Enhanced -> Recognized -> Extracted -> Responded
//! ```
//!
//! Rendering, enhancement and OCR are CPU or subprocess bound and run on the
//! blocking pool. The OCR outcome picks the extraction plan:
//!
//! | OCR outcome          | Document | Plan                        |
//! |----------------------|----------|-----------------------------|
//! | unavailable          | image    | vision model, placeholder   |
//! | unavailable          | PDF      | placeholder                 |
//! | whitespace only      | any      | `NoTextExtracted` error     |
//! | text                 | any      | text model, pattern rules   |

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::{DocumentRenderer, PageImage, SourceDocument};
use crate::enhance::ImageEnhancer;
use crate::error::{PipelineError, Result};
use crate::extract::{
    ExtractionInput, Strategy, StructuredExtractor, PLACEHOLDER_PLAN, TEXT_PLAN, VISION_PLAN,
};
use crate::llm::{OpenAiClient, TextModel, VisionModel};
use crate::models::attempt::ExtractionAttempt;
use crate::models::config::InvxConfig;
use crate::models::invoice::ExtractionResult;
use crate::ocr::{create_engine, OcrEngine, Recognition, RecognizedText, TextRecognizer};

/// Diagnostic text for PDFs that could not be read without OCR.
pub const PDF_WITHOUT_OCR: &str = "[pdf: no OCR engine available, placeholder data returned]";

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Rendered,
    Enhanced,
    Recognized,
    Extracted,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Rendered => "rendered",
            Self::Enhanced => "enhanced",
            Self::Recognized => "recognized",
            Self::Extracted => "extracted",
            Self::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Successful extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResponse {
    pub success: bool,
    pub data: ExtractionResult,
    /// Leading part of the recognized text, or a note on how the data was
    /// produced when no text was recognized.
    pub diagnostic_text: String,
    /// How the result was produced. Not part of the response body.
    #[serde(skip_serializing)]
    pub attempt: ExtractionAttempt,
}

/// The invoice extraction pipeline.
///
/// Holds only configuration and shared service handles, so one instance can
/// serve many concurrent requests.
pub struct InvoicePipeline {
    renderer: DocumentRenderer,
    enhancer: ImageEnhancer,
    recognizer: TextRecognizer,
    extractor: StructuredExtractor,
    diagnostic_chars: usize,
}

impl InvoicePipeline {
    pub fn builder() -> InvoicePipelineBuilder {
        InvoicePipelineBuilder::new()
    }

    /// Build a pipeline with the configured OCR engine and model services.
    pub fn from_config(config: InvxConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Name of the OCR engine in use.
    pub fn ocr_engine_name(&self) -> &str {
        self.recognizer.engine_name()
    }

    /// Extract invoice fields from raw bytes with a declared MIME type.
    pub async fn extract_invoice_bytes(
        &self,
        data: Vec<u8>,
        mime: &str,
    ) -> Result<ExtractionResponse> {
        let document = SourceDocument::from_mime(data, mime)?;
        self.extract_invoice(document).await
    }

    /// Extract invoice fields from a document.
    pub async fn extract_invoice(&self, document: SourceDocument) -> Result<ExtractionResponse> {
        let start = Instant::now();
        let request_id = Uuid::new_v4();
        let kind = document.kind();
        let document = Arc::new(document);

        info!(
            "[{}] Extracting invoice from {} ({} bytes)",
            request_id,
            kind,
            document.data().len()
        );
        log_stage(request_id, Stage::Received);

        let pages = self.render_and_enhance(request_id, Arc::clone(&document)).await?;

        let page_numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        let recognizer = self.recognizer.clone();
        let recognition = tokio::task::spawn_blocking(move || recognizer.recognize(&pages))
            .await
            .unwrap_or_else(|e| {
                warn!("[{}] OCR task failed: {}", request_id, e);
                let texts = vec![String::new(); page_numbers.len()];
                Recognition::Text(RecognizedText::from_pages(texts, page_numbers))
            });
        let ocr_status = recognition.status();
        log_stage(request_id, Stage::Recognized);

        let (data, mut attempt, diagnostic_text) = match recognition {
            Recognition::Unavailable { reason } if kind.is_image() => {
                debug!("[{}] OCR unavailable ({}), trying vision model", request_id, reason);
                let input = ExtractionInput::Image {
                    data: document.data(),
                    kind,
                };
                let (data, attempt) = self.extractor.extract(input, VISION_PLAN).await;
                let diagnostic = if attempt.strategy == Some(Strategy::VisionModel) {
                    "[image: no OCR engine available, extracted with vision model]"
                } else {
                    "[image: no OCR engine available, placeholder data returned]"
                };
                (data, attempt, diagnostic.to_string())
            }
            Recognition::Unavailable { reason } => {
                debug!("[{}] OCR unavailable ({}), no text to read", request_id, reason);
                let input = ExtractionInput::Image {
                    data: document.data(),
                    kind,
                };
                let (data, attempt) = self.extractor.extract(input, PLACEHOLDER_PLAN).await;
                (data, attempt, PDF_WITHOUT_OCR.to_string())
            }
            Recognition::Text(text) if text.is_blank() => {
                info!(
                    "[{}] OCR status {:?} after {}ms, {} of {} page(s) failed",
                    request_id,
                    ocr_status,
                    start.elapsed().as_millis(),
                    text.failed_pages.len(),
                    text.pages.len()
                );
                return Err(PipelineError::NoTextExtracted(format!(
                    "OCR found no text on {} page(s)",
                    text.pages.len()
                )));
            }
            Recognition::Text(text) => {
                let (data, attempt) = self
                    .extractor
                    .extract(ExtractionInput::Text(&text.text), TEXT_PLAN)
                    .await;
                let diagnostic = text.text.chars().take(self.diagnostic_chars).collect::<String>();
                (data, attempt, diagnostic)
            }
        };
        log_stage(request_id, Stage::Extracted);

        attempt.ocr_status = ocr_status;
        attempt.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            "[{}] Extracted {} of 5 fields via {} in {}ms",
            request_id,
            data.field_count(),
            attempt
                .strategy
                .map(|s| s.name())
                .unwrap_or("no strategy"),
            attempt.elapsed_ms
        );
        if !data.has_data() {
            warn!("[{}] No invoice number, vendor or amount found", request_id);
        }
        log_stage(request_id, Stage::Responded);

        Ok(ExtractionResponse {
            success: true,
            data,
            diagnostic_text,
            attempt,
        })
    }

    async fn render_and_enhance(
        &self,
        request_id: Uuid,
        document: Arc<SourceDocument>,
    ) -> Result<Vec<PageImage>> {
        let renderer = self.renderer.clone();
        let enhancer = self.enhancer;

        tokio::task::spawn_blocking(move || {
            let pages = renderer.render(&document)?;
            log_stage(request_id, Stage::Rendered);

            let enhanced: Vec<PageImage> = pages.iter().map(|p| enhancer.enhance(p)).collect();
            log_stage(request_id, Stage::Enhanced);
            Ok(enhanced)
        })
        .await
        .map_err(|e| PipelineError::Render(format!("render task failed: {}", e)))?
    }
}

fn log_stage(request_id: Uuid, stage: Stage) {
    debug!("[{}] stage: {}", request_id, stage);
}

/// Builder for [`InvoicePipeline`].
pub struct InvoicePipelineBuilder {
    config: InvxConfig,
    ocr_engine: Option<Arc<dyn OcrEngine>>,
    text_model: Option<Arc<dyn TextModel>>,
    vision_model: Option<Arc<dyn VisionModel>>,
    configured_models: bool,
}

impl InvoicePipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: InvxConfig::default(),
            ocr_engine: None,
            text_model: None,
            vision_model: None,
            configured_models: true,
        }
    }

    pub fn config(mut self, config: InvxConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this OCR engine instead of the configured one.
    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    /// Use this text model instead of the configured client.
    pub fn text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text_model = Some(model);
        self
    }

    /// Use this vision model instead of the configured client.
    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.vision_model = Some(model);
        self
    }

    /// Do not create model clients from the configuration.
    pub fn without_configured_models(mut self) -> Self {
        self.configured_models = false;
        self
    }

    pub fn build(self) -> InvoicePipeline {
        let config = self.config;
        let engine = self
            .ocr_engine
            .unwrap_or_else(|| create_engine(&config.ocr));

        let mut text_model = self.text_model;
        let mut vision_model = self.vision_model;
        if self.configured_models && config.models.is_configured() {
            let client = Arc::new(OpenAiClient::new(&config.models));
            if text_model.is_none() {
                text_model = Some(client.clone());
            }
            if vision_model.is_none() {
                vision_model = Some(client);
            }
        }

        let mut extractor = StructuredExtractor::new()
            .with_timeout(Duration::from_secs(config.models.timeout_secs));
        if let Some(model) = text_model.filter(|_| config.extraction.enable_text_model) {
            extractor = extractor.with_text_model(model);
        }
        if let Some(model) = vision_model.filter(|_| config.extraction.enable_vision_model) {
            extractor = extractor.with_vision_model(model);
        }

        debug!(
            "Built pipeline: ocr={}, render dpi={}, enhance={}",
            engine.name(),
            config.render.dpi,
            config.enhance.enabled
        );

        InvoicePipeline {
            renderer: DocumentRenderer::new(config.render.clone()),
            enhancer: ImageEnhancer::new(config.enhance),
            recognizer: TextRecognizer::new(engine),
            extractor,
            diagnostic_chars: config.extraction.diagnostic_chars,
        }
    }
}

impl Default for InvoicePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{pdf_with_pages, text_only_pdf, MediaKind};
    use crate::error::ServiceError;
    use crate::models::attempt::OcrStatus;
    use crate::models::config::RasterBackend;
    use crate::ocr::tests::ScriptedEngine;
    use crate::ocr::UnavailableEngine;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    const OUTAGE_TEXT: &str =
        "Acme Corp\nInvoice Number: INV-2024-001\nDue Date: 01/15/2025\nTotal: $1,500.00";

    /// Model service that is always down.
    struct DownModel;

    #[async_trait]
    impl TextModel for DownModel {
        fn model_name(&self) -> &str {
            "down"
        }

        async fn complete_text(&self, _prompt: &str) -> std::result::Result<String, ServiceError> {
            Err(ServiceError::Transport("connection refused".to_string()))
        }
    }

    #[async_trait]
    impl VisionModel for DownModel {
        fn model_name(&self) -> &str {
            "down"
        }

        async fn complete_vision(
            &self,
            _image_b64: &str,
            _mime_subtype: &str,
            _prompt: &str,
        ) -> std::result::Result<String, ServiceError> {
            Err(ServiceError::Transport("connection refused".to_string()))
        }
    }

    /// OCR engine that panics while recognizing.
    struct PanickingEngine;

    impl OcrEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panicking"
        }

        fn check_available(&self) -> std::result::Result<(), crate::error::OcrError> {
            Ok(())
        }

        fn recognize(
            &self,
            _image: &DynamicImage,
        ) -> std::result::Result<String, crate::error::OcrError> {
            panic!("engine crashed");
        }
    }

    /// Vision model that reads every image the same way.
    struct FixedVision(&'static str);

    #[async_trait]
    impl VisionModel for FixedVision {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete_vision(
            &self,
            _image_b64: &str,
            _mime_subtype: &str,
            _prompt: &str,
        ) -> std::result::Result<String, ServiceError> {
            Ok(self.0.to_string())
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 16, Rgb([240, 240, 240])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn test_config() -> InvxConfig {
        let mut config = InvxConfig::default();
        config.render.backend = RasterBackend::Embedded;
        config.render.dpi = 72;
        config
    }

    fn pipeline(engine: Arc<dyn OcrEngine>) -> InvoicePipelineBuilder {
        InvoicePipeline::builder()
            .config(test_config())
            .ocr_engine(engine)
            .without_configured_models()
    }

    fn no_ocr() -> Arc<dyn OcrEngine> {
        Arc::new(UnavailableEngine::new("tesseract not installed"))
    }

    #[tokio::test]
    async fn test_image_without_ocr_and_failing_vision_returns_placeholder() {
        let pipeline = pipeline(no_ocr()).vision_model(Arc::new(DownModel)).build();

        let response = pipeline
            .extract_invoice(SourceDocument::new(png_bytes(), MediaKind::Png))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        assert!(response.success);
        assert_eq!(response.data.vendor_name.as_deref(), Some("Unknown Vendor"));
        assert!(response.data.invoice_no.as_deref().unwrap().starts_with("INV-"));
        assert_eq!(response.data.amount, Some(Decimal::ZERO));
        assert_eq!(response.data.invoice_date, Some(today));
        assert_eq!(response.data.due_date, Some(today));
        assert_eq!(response.attempt.strategy, Some(Strategy::Placeholder));
        assert_eq!(response.attempt.ocr_status, OcrStatus::Unavailable);
        assert!(response.diagnostic_text.contains("placeholder"));
    }

    #[tokio::test]
    async fn test_image_without_ocr_uses_vision_model() {
        let vision = FixedVision(
            "```json\n{\"vendor_name\": \"Initech\", \"invoice_no\": \"IT-9\", \"amount\": 42, \"invoice_date\": \"2025-03-01\", \"due_date\": \"2025-03-31\"}\n```",
        );
        let pipeline = pipeline(no_ocr()).vision_model(Arc::new(vision)).build();

        let response = pipeline
            .extract_invoice_bytes(png_bytes(), "image/png")
            .await
            .unwrap();

        assert_eq!(response.attempt.strategy, Some(Strategy::VisionModel));
        assert_eq!(response.data.invoice_no.as_deref(), Some("IT-9"));
        assert_eq!(response.data.due_date, NaiveDate::from_ymd_opt(2025, 3, 31));
        assert!(response.diagnostic_text.contains("vision model"));
    }

    #[tokio::test]
    async fn test_whitespace_ocr_is_no_text_extracted() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok("   \n \t ")]));
        let pipeline = pipeline(engine).text_model(Arc::new(DownModel)).build();

        let err = pipeline
            .extract_invoice_bytes(png_bytes(), "image/png")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::NoTextExtracted(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_model_outage_falls_back_to_patterns() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(OUTAGE_TEXT)]));
        let pipeline = pipeline(engine).text_model(Arc::new(DownModel)).build();

        let response = pipeline
            .extract_invoice_bytes(png_bytes(), "image/png")
            .await
            .unwrap();

        assert_eq!(response.attempt.strategy, Some(Strategy::PatternBased));
        assert_eq!(response.attempt.ocr_status, OcrStatus::Text);
        assert_eq!(response.diagnostic_text, OUTAGE_TEXT);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": true,
                "data": {
                    "vendor_name": "Acme Corp",
                    "invoice_no": "INV-2024-001",
                    "amount": 1500.0,
                    "invoice_date": null,
                    "due_date": "2025-01-15"
                },
                "diagnostic_text": OUTAGE_TEXT
            })
        );
    }

    #[tokio::test]
    async fn test_hash_numbered_invoice_with_model_outage() {
        let text = "Acme Corp\nInvoice #INV-2024-001\nDue Date: 01/15/2025\nTotal: $1,500.00";
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(text)]));
        let pipeline = pipeline(engine).text_model(Arc::new(DownModel)).build();

        let response = pipeline
            .extract_invoice_bytes(png_bytes(), "image/png")
            .await
            .unwrap();

        assert_eq!(response.attempt.strategy, Some(Strategy::PatternBased));
        assert_eq!(response.data.invoice_no.as_deref(), Some("INV-2024-001"));
        assert_eq!(response.data.amount, Some(Decimal::new(150000, 2)));
        assert_eq!(response.data.due_date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(
            serde_json::to_value(&response.data).unwrap()["amount"],
            json!(1500.0)
        );
    }

    #[tokio::test]
    async fn test_ocr_panic_is_no_text_extracted() {
        let pipeline = pipeline(Arc::new(PanickingEngine))
            .text_model(Arc::new(DownModel))
            .build();

        let err = pipeline
            .extract_invoice_bytes(png_bytes(), "image/png")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "no_text_extracted");
    }

    #[tokio::test]
    async fn test_text_only_pdf_without_rasterizer_is_render_error() {
        let mut config = test_config();
        config.render.backend = RasterBackend::Auto;
        config.render.pdftoppm_path = "/nonexistent/bin/pdftoppm".into();
        let engine = Arc::new(ScriptedEngine::new(vec![Ok("")]));
        let pipeline = InvoicePipeline::builder()
            .config(config)
            .ocr_engine(engine.clone())
            .without_configured_models()
            .build();

        let err = pipeline
            .extract_invoice_bytes(text_only_pdf(1), "application/pdf")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "render");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pdf_without_ocr_returns_placeholder() {
        let pipeline = pipeline(no_ocr()).vision_model(Arc::new(DownModel)).build();
        let pdf = pdf_with_pages(&[(612, 792), (612, 792)]);

        let response = pipeline
            .extract_invoice_bytes(pdf, "application/pdf")
            .await
            .unwrap();

        assert_eq!(response.diagnostic_text, PDF_WITHOUT_OCR);
        assert_eq!(response.attempt.strategy, Some(Strategy::Placeholder));
        assert!(!response.attempt.fell_back());
        assert_eq!(response.data.vendor_name.as_deref(), Some("Unknown Vendor"));
    }

    #[tokio::test]
    async fn test_pdf_pages_recognized_in_order() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok("Globex Ltd\nInvoice #: G-100"),
            Ok("Amount Due: 250.00"),
        ]));
        let pipeline = pipeline(engine.clone()).build();
        let pdf = pdf_with_pages(&[(612, 792), (612, 792)]);

        let response = pipeline
            .extract_invoice_bytes(pdf, "application/pdf")
            .await
            .unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert_eq!(response.diagnostic_text, "Globex Ltd\nInvoice #: G-100\nAmount Due: 250.00");
        assert_eq!(response.data.invoice_no.as_deref(), Some("G-100"));
        assert_eq!(response.data.amount, Some(Decimal::new(25000, 2)));
    }

    #[tokio::test]
    async fn test_diagnostic_text_is_truncated_by_chars() {
        let long: &'static str = Box::leak("é".repeat(1500).into_boxed_str());
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(long)]));
        let pipeline = pipeline(engine).build();

        let response = pipeline
            .extract_invoice_bytes(png_bytes(), "image/png")
            .await
            .unwrap();

        assert_eq!(response.diagnostic_text.chars().count(), 1000);
        assert!(response.data.amount.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_media_fails_fast() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(OUTAGE_TEXT)]));
        let pipeline = pipeline(engine.clone()).build();

        let err = pipeline
            .extract_invoice_bytes(b"hello".to_vec(), "text/plain")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "unsupported_media");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_render_error() {
        let pipeline = pipeline(no_ocr()).build();
        let err = pipeline
            .extract_invoice_bytes(b"%PDF-1.7 truncated".to_vec(), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }

    #[tokio::test]
    async fn test_disabled_text_model_is_skipped() {
        let mut config = test_config();
        config.extraction.enable_text_model = false;
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(OUTAGE_TEXT)]));
        let pipeline = InvoicePipeline::builder()
            .config(config)
            .ocr_engine(engine)
            .text_model(Arc::new(DownModel))
            .build();

        let response = pipeline
            .extract_invoice_bytes(png_bytes(), "image/png")
            .await
            .unwrap();

        assert_eq!(
            response.attempt.failures[0].reason,
            "strategy disabled: no text model configured"
        );
        assert_eq!(response.data.invoice_no.as_deref(), Some("INV-2024-001"));
    }

    #[test]
    fn test_pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InvoicePipeline>();
    }
}
