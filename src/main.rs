// src/main.rs
use anyhow::{bail, Context};
use chart_review::core::review::{ChartReviewService, ReviewOptions};
use chart_review::utils::config::{init_logging, Settings};
use chart_review::utils::ir_processor::IrProcessor;
use log::info;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: chart-review <ir.json | ir_dir> [output]");
    };
    let output = args.next().map(PathBuf::from);

    let settings = Settings::from_env()?;
    settings.log_summary();
    let service = ChartReviewService::from_settings(&settings, Vec::new());

    if input.is_dir() {
        let output_dir = output.unwrap_or_else(|| settings.ir_output_dir.clone());
        let summary = IrProcessor::new(&service).process_directory(&input, &output_dir)?;
        println!(
            "✅ Reviewed {} file(s) ({} failed): {} chart(s), {} repaired, {} not renderable",
            summary.files_processed,
            summary.files_failed,
            summary.stats.total,
            summary.stats.repaired(),
            summary.stats.failed
        );
        return Ok(());
    }

    review_single_file(&service, &settings, &input, output.as_deref())
}

fn review_single_file(
    service: &ChartReviewService,
    settings: &Settings,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read IR file: {}", input.display()))?;
    let mut document: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse IR file: {}", input.display()))?;

    let target = output.unwrap_or(input);
    info!("Reviewing charts in {}", input.display());
    service.review_document(&mut document, Some(target), ReviewOptions::from_settings(settings));

    let stats = service.stats();
    println!(
        "✅ {} chart(s): {} valid, {} repaired (local {}, api {}), {} not renderable",
        stats.total,
        stats.valid,
        stats.repaired(),
        stats.repaired_locally,
        stats.repaired_api,
        stats.failed
    );
    Ok(())
}
