//! Engines command - report which backends can run.

use console::style;

use invx_core::document::pdftoppm_available;
use invx_core::models::config::RasterBackend;
use invx_core::TextRecognizer;

use super::load_config;

pub async fn run(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path, false)?;

    println!("{}", style("OCR").bold());
    let recognizer = TextRecognizer::from_config(&config.ocr);
    match recognizer.check_available() {
        Ok(()) => println!("  {} {}", style("✓").green(), recognizer.engine_name()),
        Err(e) => println!("  {} {}: {}", style("✗").red(), recognizer.engine_name(), e),
    }

    println!();
    println!("{}", style("PDF rendering").bold());
    println!("  backend: {:?}, {} dpi", config.render.backend, config.render.dpi);
    let poppler = pdftoppm_available(&config.render.pdftoppm_path);
    let marker = if poppler {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!(
        "  {} pdftoppm ({})",
        marker,
        config.render.pdftoppm_path.display()
    );
    if !poppler && config.render.backend == RasterBackend::Auto {
        println!("    falling back to embedded page images");
    }

    println!();
    println!("{}", style("Model services").bold());
    if config.models.is_configured() {
        println!(
            "  {} {} (text: {}, vision: {})",
            style("✓").green(),
            config.models.api_base,
            config.models.text_model,
            config.models.vision_model
        );
    } else {
        println!(
            "  {} no API key; set OPENAI_API_KEY or models.api_key",
            style("✗").yellow()
        );
    }

    Ok(())
}
