//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::OcrEngine;
use crate::error::OcrError;

const DET_MODEL: &str = "det.onnx";
const REC_MODEL: &str = "latin_rec.onnx";
const DICTIONARY: &str = "latin_dict.txt";

/// Vertical bucket, in pixels, for grouping text boxes into lines.
const LINE_HEIGHT: f64 = 20.0;

/// OCR engine backed by `pure-onnx-ocr` (no external ONNX Runtime).
///
/// Models are loaded on the first page so that probing stays cheap.
pub struct OnnxEngine {
    model_dir: PathBuf,
    engine: Mutex<Option<pure_onnx_ocr::engine::OcrEngine>>,
}

impl OnnxEngine {
    pub fn new(model_dir: &Path) -> Self {
        Self {
            model_dir: model_dir.to_path_buf(),
            engine: Mutex::new(None),
        }
    }

    fn model_paths(&self) -> [PathBuf; 3] {
        [
            self.model_dir.join(DET_MODEL),
            self.model_dir.join(REC_MODEL),
            self.model_dir.join(DICTIONARY),
        ]
    }

    fn load(&self) -> Result<pure_onnx_ocr::engine::OcrEngine, OcrError> {
        let [det_path, rec_path, dict_path] = self.model_paths();

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::Unavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", self.model_dir.display());
        Ok(engine)
    }
}

impl OcrEngine for OnnxEngine {
    fn name(&self) -> &str {
        "onnx"
    }

    fn check_available(&self) -> Result<(), OcrError> {
        match self.model_paths().iter().find(|p| !p.is_file()) {
            Some(missing) => Err(OcrError::Unavailable(format!(
                "model file {} not found",
                missing.display()
            ))),
            None => Ok(()),
        }
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let mut guard = self
            .engine
            .lock()
            .map_err(|_| OcrError::Recognition("OCR engine lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let Some(engine) = guard.as_ref() else {
            return Err(OcrError::Unavailable("models not loaded".to_string()));
        };

        let (width, height) = image.dimensions();
        debug!("Running pure-onnx-ocr on {}x{} image", width, height);

        let results = engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        // Sort by reading order: top-to-bottom rows, then left-to-right
        let mut lines: Vec<(i64, f64, String)> = results
            .iter()
            .map(|r| {
                let (x, y) = r
                    .bounding_box
                    .exterior()
                    .coords()
                    .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| {
                        (x.min(c.x), y.min(c.y))
                    });
                ((y / LINE_HEIGHT) as i64, x, r.text.replace("[UNK]", " "))
            })
            .collect();
        lines.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        debug!("pure-onnx-ocr returned {} text regions", lines.len());

        Ok(lines
            .into_iter()
            .map(|(_, _, text)| text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
