use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn invx() -> Command {
    let mut cmd = Command::cargo_bin("invx").unwrap();
    cmd.env_remove("TESSERACT_CMD")
        .env_remove("OPENAI_API_KEY")
        .env_remove("INVX_API_BASE");
    cmd
}

/// Config with an OCR binary that cannot exist.
fn write_no_ocr_config(dir: &Path) -> String {
    let path = dir.join("config.json");
    fs::write(
        &path,
        r#"{"ocr": {"tesseract_path": "/nonexistent/bin/tesseract"}, "render": {"backend": "embedded"}}"#,
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

fn write_png(path: &Path) {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 24, Rgb([250, 250, 250])))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

#[test]
fn test_help_lists_commands() {
    invx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("engines"));
}

#[test]
fn test_process_missing_file() {
    let dir = TempDir::new().unwrap();
    let config = write_no_ocr_config(dir.path());

    invx()
        .args(["--config", &config, "process", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_process_rejects_unsupported_type() {
    let dir = TempDir::new().unwrap();
    let config = write_no_ocr_config(dir.path());
    let input = dir.path().join("notes.txt");
    fs::write(&input, "Invoice #123").unwrap();

    invx()
        .args(["--config", &config, "process"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported media type"));
}

#[test]
fn test_process_image_without_ocr_returns_placeholder() {
    let dir = TempDir::new().unwrap();
    let config = write_no_ocr_config(dir.path());
    let input = dir.path().join("scan.png");
    write_png(&input);

    invx()
        .args(["--config", &config, "process", "--offline"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"))
        .stdout(predicate::str::contains("Unknown Vendor"))
        .stdout(predicate::str::contains("attempt").not());
}

#[test]
fn test_batch_writes_outputs_and_summary() {
    let dir = TempDir::new().unwrap();
    let config = write_no_ocr_config(dir.path());
    let inputs = dir.path().join("in");
    let out = dir.path().join("out");
    fs::create_dir_all(&inputs).unwrap();
    write_png(&inputs.join("a.png"));
    write_png(&inputs.join("b.png"));
    let pattern = format!("{}/*.png", inputs.display());

    invx()
        .args(["--config", &config, "batch", "--offline", "--summary", "-j", "2", "-o"])
        .arg(&out)
        .arg(&pattern)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful"));

    assert!(out.join("a.json").exists());
    assert!(out.join("b.json").exists());
    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.starts_with("filename,status,"));
    assert_eq!(summary.matches(",success,").count(), 2);
    assert!(summary.contains("placeholder"));
}

#[test]
fn test_config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let path = path.to_string_lossy().into_owned();

    invx()
        .args(["--config", &path, "config", "init"])
        .assert()
        .success();

    invx()
        .args(["--config", &path, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    invx()
        .args(["--config", &path, "config", "get", "render.dpi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("300"));

    invx()
        .args(["--config", &path, "config", "set", "render.dpi", "150"])
        .assert()
        .success();

    invx()
        .args(["--config", &path, "config", "get", "render.dpi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("150"));

    invx()
        .args(["--config", &path, "config", "get", "render.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key not found"));
}

#[test]
fn test_config_path_reports_status() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    invx()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));
}

#[test]
fn test_engines_reports_missing_ocr() {
    let dir = TempDir::new().unwrap();
    let config = write_no_ocr_config(dir.path());

    invx()
        .args(["--config", &config, "engines"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tesseract"))
        .stdout(predicate::str::contains("no API key"));
}

#[test]
fn test_config_show_masks_api_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"models": {"api_key": "sk-test-secret-9876"}}"#).unwrap();

    invx()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****9876"))
        .stdout(predicate::str::contains("sk-test-secret").not());
}
