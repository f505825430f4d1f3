//! Process command - extract data from a single invoice file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invx_core::{ExtractionResponse, ExtractionResult, InvoicePipeline, MediaKind, SourceDocument};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, JPEG or PNG)
    #[arg(required = true)]
    input: PathBuf,

    /// MIME type of the input (default: guessed from the extension)
    #[arg(long)]
    mime: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Report missing or inconsistent fields
    #[arg(long)]
    validate: bool,

    /// Show which strategy produced the result
    #[arg(long)]
    show_attempt: bool,

    /// Do not call model services
    #[arg(long)]
    offline: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path, args.offline)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let kind = match &args.mime {
        Some(mime) => MediaKind::from_mime(mime)?,
        None => MediaKind::from_path(&args.input)?,
    };
    let data = fs::read(&args.input)?;

    info!("Processing file: {} as {}", args.input.display(), kind);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Extracting {}...", args.input.display()));

    let pipeline = InvoicePipeline::from_config(config);
    let result = pipeline
        .extract_invoice(SourceDocument::new(data, kind))
        .await;
    pb.finish_and_clear();
    let response = result?;

    if args.validate {
        let issues = validation_issues(&response.data);
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_response(&response, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_attempt {
        print_attempt(&response);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Problems with an extracted record, most serious first.
fn validation_issues(data: &ExtractionResult) -> Vec<String> {
    let mut issues = Vec::new();
    if !data.has_data() {
        issues.push("no identifying data found (invoice number, vendor or amount)".to_string());
    }
    issues.extend(data.validate());
    issues
}

fn print_attempt(response: &ExtractionResponse) {
    let attempt = &response.attempt;
    eprintln!();
    eprintln!(
        "{} Strategy: {}",
        style("ℹ").blue(),
        attempt
            .strategy
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    for failure in &attempt.failures {
        eprintln!(
            "  {} {} failed: {}",
            style("-").yellow(),
            failure.strategy,
            failure.reason
        );
    }
    eprintln!("{} OCR: {:?}", style("ℹ").blue(), attempt.ocr_status);
    eprintln!("{} Processing time: {}ms", style("ℹ").blue(), attempt.elapsed_ms);
}

pub fn format_response(
    response: &ExtractionResponse,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
        OutputFormat::Csv => format_csv(response),
        OutputFormat::Text => Ok(format_text(response)),
    }
}

fn format_csv(response: &ExtractionResponse) -> anyhow::Result<String> {
    let data = &response.data;
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["vendor_name", "invoice_no", "amount", "invoice_date", "due_date"])?;
    wtr.write_record([
        data.vendor_name.clone().unwrap_or_default(),
        data.invoice_no.clone().unwrap_or_default(),
        data.amount.map(|a| a.to_string()).unwrap_or_default(),
        data.invoice_date.map(|d| d.to_string()).unwrap_or_default(),
        data.due_date.map(|d| d.to_string()).unwrap_or_default(),
    ])?;

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(response: &ExtractionResponse) -> String {
    fn or_dash(value: Option<String>) -> String {
        value.unwrap_or_else(|| "-".to_string())
    }

    let data = &response.data;
    let mut output = String::new();

    output.push_str(&format!("Vendor:       {}\n", or_dash(data.vendor_name.clone())));
    output.push_str(&format!("Invoice:      {}\n", or_dash(data.invoice_no.clone())));
    output.push_str(&format!("Amount:       {}\n", or_dash(data.amount.map(|a| a.to_string()))));
    output.push_str(&format!(
        "Invoice date: {}\n",
        or_dash(data.invoice_date.map(|d| d.to_string()))
    ));
    output.push_str(&format!(
        "Due date:     {}\n",
        or_dash(data.due_date.map(|d| d.to_string()))
    ));

    output
}
