//! Source documents and their conversion to page images.

mod pdf;

pub use pdf::pdftoppm_available;

#[cfg(test)]
pub(crate) use pdf::tests::{pdf_with_pages, text_only_pdf};

use std::fmt;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::config::RenderConfig;

/// Accepted document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Pdf,
    Jpeg,
    Png,
}

impl MediaKind {
    /// Parse a MIME type such as `image/png` or `application/pdf; charset=binary`.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(Self::Pdf),
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            _ => Err(PipelineError::UnsupportedMedia(format!(
                "{} (expected application/pdf, image/jpeg or image/png)",
                mime.trim()
            ))),
        }
    }

    /// Guess the type from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            _ => Err(PipelineError::UnsupportedMedia(format!(
                "{} (unknown extension)",
                path.display()
            ))),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Subtype after the slash, as used in data URIs.
    pub fn mime_subtype(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }

    fn image_format(&self) -> Option<ImageFormat> {
        match self {
            Self::Pdf => None,
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Png => Some(ImageFormat::Png),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// An uploaded document: raw bytes plus their declared type.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    data: Vec<u8>,
    kind: MediaKind,
}

impl SourceDocument {
    pub fn new(data: Vec<u8>, kind: MediaKind) -> Self {
        Self { data, kind }
    }

    /// Create a document from bytes and a MIME type.
    pub fn from_mime(data: Vec<u8>, mime: &str) -> Result<Self> {
        Ok(Self::new(data, MediaKind::from_mime(mime)?))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// One rasterized page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page_number: u32,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(page_number: u32, image: DynamicImage) -> Self {
        Self { page_number, image }
    }
}

/// Converts documents into page images.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    config: RenderConfig,
}

impl DocumentRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a document: one page for an image, one per page for a PDF.
    pub fn render(&self, document: &SourceDocument) -> Result<Vec<PageImage>> {
        let pages = match document.kind().image_format() {
            Some(format) => {
                let image = image::load_from_memory_with_format(document.data(), format)?;
                vec![PageImage::new(1, image)]
            }
            None => pdf::render_pdf(document.data(), &self.config)?,
        };

        debug!(
            "Rendered {} as {} page(s) from {} bytes",
            document.kind(),
            pages.len(),
            document.data().len()
        );
        Ok(pages)
    }
}
