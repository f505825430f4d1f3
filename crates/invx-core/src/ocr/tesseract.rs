//! Tesseract OCR via its command-line interface.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use super::OcrEngine;
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Runs `tesseract stdin stdout` per page.
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    page_segmentation_mode: u8,
    engine_mode: u8,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            engine_mode: config.engine_mode,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("--oem")
            .arg(self.engine_mode.to_string())
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .arg("-l")
            .arg(&self.language);
        cmd
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn check_available(&self) -> Result<(), OcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| {
                OcrError::Unavailable(format!("cannot run {}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            return Err(OcrError::Unavailable(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }
        Ok(())
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png)?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(OcrError::Recognition(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract returned {} chars", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_line() {
        let engine = TesseractEngine::new(&OcrConfig::default());
        let cmd = engine.command();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(cmd.get_program(), "tesseract");
        assert_eq!(
            args,
            vec!["stdin", "stdout", "--oem", "3", "--psm", "6", "-l", "eng"]
        );
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let config = OcrConfig {
            tesseract_path: "/nonexistent/bin/tesseract".into(),
            ..OcrConfig::default()
        };
        let err = TesseractEngine::new(&config).check_available().unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));
    }
}
