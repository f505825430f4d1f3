//! Image enhancement ahead of OCR.

use image::{imageops, DynamicImage, RgbImage};
use tracing::trace;

use crate::document::PageImage;
use crate::models::config::EnhanceConfig;

/// 3x3 sharpen kernel; `filter3x3` divides by the kernel sum (16).
const SHARPEN_KERNEL: [f32; 9] = [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0];

/// Deterministic contrast and sharpness boost for scanned pages.
///
/// Steps run in a fixed order: convert to RGB8, stretch contrast around the
/// mean luminance, then sharpen. A step that does not apply to the image
/// (empty image, or too small for a 3x3 kernel) is skipped.
#[derive(Debug, Clone, Copy)]
pub struct ImageEnhancer {
    config: EnhanceConfig,
}

impl ImageEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }

    /// Enhance one page. Never fails.
    pub fn enhance(&self, page: &PageImage) -> PageImage {
        if !self.config.enabled {
            return page.clone();
        }

        let mut rgb = page.image.to_rgb8();

        if rgb.width() == 0 || rgb.height() == 0 {
            trace!("Page {}: empty image, skipping contrast", page.page_number);
        } else {
            adjust_contrast(&mut rgb, self.config.contrast_factor);
        }

        if !self.config.sharpen {
            trace!("Page {}: sharpening disabled", page.page_number);
        } else if rgb.width() < 3 || rgb.height() < 3 {
            trace!(
                "Page {}: {}x{} too small to sharpen",
                page.page_number,
                rgb.width(),
                rgb.height()
            );
        } else {
            rgb = sharpen(&rgb);
        }

        PageImage::new(page.page_number, DynamicImage::ImageRgb8(rgb))
    }
}

/// `out = mean + factor * (in - mean)` per channel, `mean` being the
/// rounded average luminance.
fn adjust_contrast(image: &mut RgbImage, factor: f32) {
    let pixels = u64::from(image.width()) * u64::from(image.height());
    let luma_sum: f64 = image
        .pixels()
        .map(|p| 0.299 * f64::from(p[0]) + 0.587 * f64::from(p[1]) + 0.114 * f64::from(p[2]))
        .sum();
    let mean = (luma_sum / pixels as f64).round() as f32;

    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let value = mean + factor * (f32::from(*channel) - mean);
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn sharpen(image: &RgbImage) -> RgbImage {
    let mut out: RgbImage = imageops::filter3x3(image, &SHARPEN_KERNEL);

    // The kernel only covers interior pixels; keep the original border
    let (width, height) = image.dimensions();
    for x in 0..width {
        out.put_pixel(x, 0, *image.get_pixel(x, 0));
        out.put_pixel(x, height - 1, *image.get_pixel(x, height - 1));
    }
    for y in 0..height {
        out.put_pixel(0, y, *image.get_pixel(0, y));
        out.put_pixel(width - 1, y, *image.get_pixel(width - 1, y));
    }

    out
}
