//! Core library for invoice data extraction.
//!
//! This crate provides:
//! - Document rendering (PDF pages and images to page images)
//! - Image enhancement ahead of OCR
//! - OCR through Tesseract or, with the `onnx` feature, a pure Rust engine
//! - Cascading field extraction: vision model, text model, pattern rules
//! - The end-to-end [`InvoicePipeline`]

pub mod document;
pub mod enhance;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;

pub use document::{DocumentRenderer, MediaKind, PageImage, SourceDocument};
pub use enhance::ImageEnhancer;
pub use error::{PipelineError, Result};
pub use extract::{PatternParser, Strategy, StructuredExtractor};
pub use llm::{OpenAiClient, TextModel, VisionModel};
pub use models::{ExtractionAttempt, ExtractionResult, InvxConfig, OcrStatus};
pub use ocr::{OcrEngine, Recognition, TextRecognizer};
pub use pipeline::{ExtractionResponse, InvoicePipeline, Stage};
