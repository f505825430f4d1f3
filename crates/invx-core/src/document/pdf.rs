//! PDF validation and rasterization.

use std::path::Path;
use std::process::Command;

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::PageImage;
use crate::error::{PipelineError, Result};
use crate::models::config::{RasterBackend, RenderConfig};

/// US Letter in points, used when a page has no usable MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Whether the `pdftoppm` binary at `path` can be started.
pub fn pdftoppm_available(path: &Path) -> bool {
    Command::new(path).arg("-v").output().is_ok()
}

/// Render every page of a PDF to an image, in page order.
pub(crate) fn render_pdf(data: &[u8], config: &RenderConfig) -> Result<Vec<PageImage>> {
    let doc = load_document(data)?;
    let total = doc.get_pages().len();
    let count = if config.max_pages > 0 {
        total.min(config.max_pages)
    } else {
        total
    };

    debug!("Loaded PDF with {} pages, rendering {}", total, count);

    match config.backend {
        RasterBackend::Poppler => render_with_poppler(data, count, config),
        RasterBackend::Embedded => render_embedded(&doc, count, config.dpi),
        RasterBackend::Auto => {
            if !pdftoppm_available(&config.pdftoppm_path) {
                debug!("pdftoppm not found, using embedded page images");
                return render_embedded(&doc, count, config.dpi);
            }
            match render_with_poppler(data, count, config) {
                Ok(pages) => Ok(pages),
                Err(e) => {
                    warn!("pdftoppm failed ({}), using embedded page images", e);
                    render_embedded(&doc, count, config.dpi)
                }
            }
        }
    }
}

fn load_document(data: &[u8]) -> Result<Document> {
    let mut doc = Document::load_mem(data)?;

    // PDFs encrypted with an empty user password open without prompting
    if doc.is_encrypted() {
        if doc.decrypt("").is_err() {
            return Err(PipelineError::Render(
                "PDF is password protected".to_string(),
            ));
        }
        debug!("Decrypted PDF with empty password");
    }

    if doc.get_pages().is_empty() {
        return Err(PipelineError::Render("PDF has no pages".to_string()));
    }

    Ok(doc)
}

fn render_with_poppler(data: &[u8], count: usize, config: &RenderConfig) -> Result<Vec<PageImage>> {
    let dir = tempfile::tempdir()
        .map_err(|e| PipelineError::Render(format!("failed to create temp dir: {}", e)))?;
    let input = dir.path().join("input.pdf");
    std::fs::write(&input, data)
        .map_err(|e| PipelineError::Render(format!("failed to stage PDF: {}", e)))?;

    let output = Command::new(&config.pdftoppm_path)
        .arg("-r")
        .arg(config.dpi.to_string())
        .arg("-png")
        .arg("-f")
        .arg("1")
        .arg("-l")
        .arg(count.to_string())
        .arg(&input)
        .arg(dir.path().join("page"))
        .output()
        .map_err(|e| PipelineError::Render(format!("failed to run pdftoppm: {}", e)))?;

    if !output.status.success() {
        return Err(PipelineError::Render(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // pdftoppm zero-pads the page suffix depending on the page count
    let mut files: Vec<(u32, std::path::PathBuf)> = std::fs::read_dir(dir.path())
        .map_err(|e| PipelineError::Render(e.to_string()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| page_suffix(&path).map(|n| (n, path)))
        .collect();
    files.sort_by_key(|(n, _)| *n);

    if files.len() != count {
        return Err(PipelineError::Render(format!(
            "pdftoppm produced {} of {} pages",
            files.len(),
            count
        )));
    }

    files
        .into_iter()
        .enumerate()
        .map(|(i, (_, path))| {
            let bytes = std::fs::read(&path).map_err(|e| PipelineError::Render(e.to_string()))?;
            let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
            Ok(PageImage::new(i as u32 + 1, image))
        })
        .collect()
}

/// Page number from a `page-07.png` style file name.
fn page_suffix(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}

/// Use the largest embedded image of each page as its raster.
///
/// Only scanned pages can be read this way. A page drawn with text or vector
/// operators has no such image and fails the whole document.
fn render_embedded(doc: &Document, count: usize, dpi: u32) -> Result<Vec<PageImage>> {
    doc.get_pages()
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, (_, page_id))| {
            let page_number = i as u32 + 1;
            let image = largest_page_image(doc, page_id).ok_or_else(|| {
                PipelineError::Render(format!(
                    "page {} has no raster content and no rasterizer is available",
                    page_number
                ))
            })?;
            let target = page_size_at(doc, page_id, dpi);
            Ok(PageImage::new(page_number, fit_to_page(image, target)))
        })
        .collect()
}

fn largest_page_image(doc: &Document, page_id: ObjectId) -> Option<DynamicImage> {
    let resources = inherited(doc, page_id, b"Resources")?;
    let Object::Dictionary(resources) = resources else {
        return None;
    };
    let (_, xobjects) = doc.dereference(resources.get(b"XObject").ok()?).ok()?;
    let Object::Dictionary(xobjects) = xobjects else {
        return None;
    };

    xobjects
        .iter()
        .filter_map(|(_, obj_ref)| doc.dereference(obj_ref).ok())
        .filter_map(|(_, obj)| decode_image_object(doc, obj))
        .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter on {}x{} image", width, height);
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    raw_image(&data, width, height, color_space)
}

fn raw_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;

    match color_space {
        b"DeviceRGB" | b"RGB" => {
            let len = pixels.checked_mul(3)?;
            let raw = data.get(..len)?.to_vec();
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, raw).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" => {
            let raw = data.get(..pixels)?.to_vec();
            ImageBuffer::from_raw(width, height, raw).map(DynamicImage::ImageLuma8)
        }
        other => {
            trace!("Unsupported color space {}", String::from_utf8_lossy(other));
            None
        }
    }
}

/// Page size in pixels at `dpi`.
fn page_size_at(doc: &Document, page_id: ObjectId, dpi: u32) -> (u32, u32) {
    let (width_pt, height_pt) = media_box_size(doc, page_id).unwrap_or(DEFAULT_PAGE_SIZE);
    let scale = dpi as f32 / 72.0;
    (
        ((width_pt * scale).round() as u32).max(1),
        ((height_pt * scale).round() as u32).max(1),
    )
}

/// Scale an image to fit the page box, keeping its aspect ratio.
fn fit_to_page(image: DynamicImage, (width, height): (u32, u32)) -> DynamicImage {
    let fits = (image.width() == width && image.height() <= height)
        || (image.height() == height && image.width() <= width);
    if fits {
        return image;
    }

    trace!(
        "Scaling {}x{} page image into {}x{}",
        image.width(),
        image.height(),
        width,
        height
    );
    image.resize(width, height, FilterType::CatmullRom)
}

fn media_box_size(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let Object::Array(rect) = inherited(doc, page_id, b"MediaBox")? else {
        return None;
    };
    let coords: Vec<f32> = rect
        .iter()
        .filter_map(|o| match doc.dereference(o).ok()?.1 {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r as f32),
            _ => None,
        })
        .collect();

    match coords.as_slice() {
        [x0, y0, x1, y1] if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
            Some(((x1 - x0).abs(), (y1 - y0).abs()))
        }
        _ => None,
    }
}

/// Look up an inheritable page attribute, walking up the page tree.
fn inherited<'a>(doc: &'a Document, node_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node: &Dictionary = doc.get_dictionary(node_id).ok()?;

    // Bounded walk guards against cyclic Parent links
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    /// Build a scanned-style PDF whose pages have the given MediaBox sizes in
    /// points. Each page carries a gray image at half its size in points.
    pub(crate) fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
        build_pdf(sizes, |w, h| Some(gray_image((w / 2).max(1), (h / 2).max(1), 200)))
    }

    /// Build a PDF of Letter pages drawn only with text operators.
    pub(crate) fn text_only_pdf(pages: usize) -> Vec<u8> {
        build_pdf(&vec![(612, 792); pages], |_, _| None)
    }

    fn gray_image(width: i64, height: i64, value: u8) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![value; (width * height) as usize],
        )
    }

    fn build_pdf<F>(sizes: &[(i64, i64)], image_for: F) -> Vec<u8>
    where
        F: Fn(i64, i64) -> Option<Stream>,
    {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for &(w, h) in sizes {
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            };
            match image_for(w, h) {
                Some(stream) => {
                    let image_id = doc.add_object(stream);
                    page.set(
                        "Resources",
                        dictionary! { "XObject" => dictionary! { "Im1" => image_id } },
                    );
                }
                None => {
                    let content = b"BT /F1 24 Tf 72 700 Td (Invoice #INV-2024-001) Tj ET".to_vec();
                    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
                    page.set("Contents", content_id);
                    page.set(
                        "Resources",
                        dictionary! { "Font" => dictionary! { "F1" => font_id } },
                    );
                }
            }
            kids.push(doc.add_object(page).into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => sizes.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn embedded(dpi: u32, max_pages: usize) -> RenderConfig {
        RenderConfig {
            dpi,
            backend: RasterBackend::Embedded,
            max_pages,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_page_count_and_order() {
        let data = pdf_with_pages(&[(72, 72), (144, 72), (216, 72)]);
        let pages = render_pdf(&data, &embedded(72, 0)).unwrap();

        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        let widths: Vec<u32> = pages.iter().map(|p| p.image.width()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(widths, vec![72, 144, 216]);
    }

    #[test]
    fn test_embedded_image_scales_to_dpi() {
        // 36x72 image on a 72x144 pt page: 150 DPI gives 150x300
        let data = pdf_with_pages(&[(72, 144)]);
        let pages = render_pdf(&data, &embedded(150, 0)).unwrap();

        assert_eq!((pages[0].image.width(), pages[0].image.height()), (150, 300));
    }

    #[test]
    fn test_max_pages_caps_output() {
        let data = pdf_with_pages(&[(72, 72); 5]);
        let pages = render_pdf(&data, &embedded(72, 2)).unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_embedded_raw_image() {
        let pixels = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 10, 20, 30];
        let rgb = move |_: i64, _: i64| {
            Some(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 2,
                    "Height" => 2,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                pixels.clone(),
            ))
        };
        // A 2x2 pt page at 72 DPI needs no scaling
        let data = build_pdf(&[(2, 2), (2, 2)], rgb);
        let pages = render_pdf(&data, &embedded(72, 0)).unwrap();

        assert_eq!(pages.len(), 2);
        for page in &pages {
            assert_eq!((page.image.width(), page.image.height()), (2, 2));
            assert_eq!(page.image.to_rgb8().get_pixel(1, 1), &Rgb([10, 20, 30]));
        }
    }

    #[test]
    fn test_fit_to_page_keeps_aspect_ratio() {
        let image = DynamicImage::new_rgb8(100, 50);
        let fitted = fit_to_page(image, (400, 400));
        assert_eq!((fitted.width(), fitted.height()), (400, 200));

        let exact = DynamicImage::new_rgb8(400, 200);
        assert_eq!(fit_to_page(exact, (400, 400)).width(), 400);
    }

    #[test]
    fn test_auto_without_pdftoppm_uses_embedded() {
        let config = RenderConfig {
            dpi: 72,
            pdftoppm_path: "/nonexistent/bin/pdftoppm".into(),
            ..RenderConfig::default()
        };
        let pages = render_pdf(&pdf_with_pages(&[(100, 50)]), &config).unwrap();
        assert_eq!((pages[0].image.width(), pages[0].image.height()), (100, 50));
    }

    #[test]
    fn test_text_page_without_rasterizer_is_render_error() {
        let config = RenderConfig {
            pdftoppm_path: "/nonexistent/bin/pdftoppm".into(),
            ..RenderConfig::default()
        };
        assert_eq!(config.backend, RasterBackend::Auto);

        let err = render_pdf(&text_only_pdf(1), &config).unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
        assert!(err.to_string().contains("page 1 has no raster content"));
    }

    #[test]
    fn test_embedded_backend_rejects_mixed_document() {
        // Page 1 scanned, page 2 text only
        let data = build_pdf(&[(72, 72), (144, 72)], |w, _| {
            (w == 72).then(|| gray_image(36, 36, 90))
        });

        let err = render_pdf(&data, &embedded(72, 0)).unwrap_err();
        assert!(err.to_string().contains("page 2 has no raster content"));
    }

    #[test]
    fn test_corrupt_pdf_is_render_error() {
        let err = render_pdf(b"%PDF-1.4 garbage", &embedded(72, 0)).unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }

    #[test]
    fn test_pdf_without_pages_is_render_error() {
        let err = render_pdf(&pdf_with_pages(&[]), &embedded(72, 0)).unwrap_err();
        assert!(err.to_string().contains("no pages"));
    }

    #[test]
    fn test_page_suffix() {
        assert_eq!(page_suffix(Path::new("/tmp/x/page-07.png")), Some(7));
        assert_eq!(page_suffix(Path::new("/tmp/x/page-12.png")), Some(12));
        assert_eq!(page_suffix(Path::new("/tmp/x/input.pdf")), None);
    }
}
