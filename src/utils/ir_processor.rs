use crate::core::review::{ChartReviewService, ReviewStats};
use crate::core::writer::{JsonWriter, Writer};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Batch summary written at the root of the output directory.
pub const SUMMARY_FILE: &str = "review_summary.json";

/// Outcome of a directory batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub stats: ReviewStats,
}

#[derive(Serialize)]
struct BatchReport<'s> {
    finished_at: DateTime<Utc>,
    input_dir: String,
    files_processed: usize,
    files_failed: usize,
    stats: &'s ReviewStats,
}

/// Reviews every IR file found under a directory and mirrors the results
/// into an output directory.
pub struct IrProcessor<'a> {
    service: &'a ChartReviewService,
    writer: JsonWriter,
}

impl<'a> IrProcessor<'a> {
    pub fn new(service: &'a ChartReviewService) -> Self {
        Self {
            service,
            writer: JsonWriter,
        }
    }

    /// Process all `*.json` files under `input_dir`; each reviewed file lands
    /// at the same relative path under `output_dir`.
    pub fn process_directory<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        input_dir: P1,
        output_dir: P2,
    ) -> Result<BatchSummary> {
        let input_path = input_dir.as_ref();
        let output_path = output_dir.as_ref();

        info!("Starting to review IR files from: {}", input_path.display());
        fs::create_dir_all(output_path)
            .with_context(|| format!("Failed to create output directory: {}", output_path.display()))?;

        // Outputs nested inside the input tree must not be reviewed again;
        // reviewing in place (same directory) is allowed.
        let skip_nested_output = output_path != input_path && output_path.starts_with(input_path);

        let mut summary = BatchSummary::default();
        for entry in WalkDir::new(input_path).sort_by_file_name() {
            let entry = entry.map_err(|e| anyhow::anyhow!("Failed to read directory entry: {}", e))?;
            let file_path = entry.path();

            let is_json = file_path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            let is_summary = entry.file_name() == SUMMARY_FILE;
            let in_output = skip_nested_output && file_path.starts_with(output_path);
            if !entry.file_type().is_file() || !is_json || is_summary || in_output {
                debug!("Skipping non-IR entry: {}", file_path.display());
                continue;
            }

            let relative = file_path.strip_prefix(input_path)?;
            let target = output_path.join(relative);
            match self.process_file(file_path, &target) {
                Ok(stats) => {
                    summary.files_processed += 1;
                    summary.stats.absorb(&stats);
                }
                Err(e) => {
                    error!("Failed to review {}: {:#}", file_path.display(), e);
                    summary.files_failed += 1;
                    continue;
                }
            }
        }

        if let Err(e) = self.save_summary(&summary, input_path, output_path) {
            warn!("Failed to save batch summary: {:#}", e);
        }

        info!(
            "Completed IR review: {} file(s) processed, {} failed",
            summary.files_processed, summary.files_failed
        );
        Ok(summary)
    }

    /// Review one IR file and write the result plus a text report next to `out_path`.
    pub fn process_file(&self, input: &Path, out_path: &Path) -> Result<ReviewStats> {
        let text = fs::read_to_string(input)
            .with_context(|| format!("Failed to read IR file: {}", input.display()))?;
        let mut document: Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse IR file: {}", input.display()))?;

        self.service.review_document(&mut document, None, self.service.default_options());
        let stats = self.service.stats();

        self.writer.write_document(&document, out_path)?;
        if let Err(e) = self.save_report(&stats, input, out_path) {
            warn!("Failed to save review report for {}: {:#}", input.display(), e);
        }
        Ok(stats)
    }

    fn save_summary(&self, summary: &BatchSummary, input: &Path, output_dir: &Path) -> Result<()> {
        let report = BatchReport {
            finished_at: Utc::now(),
            input_dir: input.display().to_string(),
            files_processed: summary.files_processed,
            files_failed: summary.files_failed,
            stats: &summary.stats,
        };
        let path = output_dir.join(SUMMARY_FILE);
        fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        Ok(())
    }

    fn save_report(&self, stats: &ReviewStats, input: &Path, out_path: &Path) -> Result<()> {
        use std::fmt::Write;

        let report_path = out_path.with_file_name(format!(
            "{}_review.txt",
            out_path.file_stem().unwrap_or_default().to_string_lossy()
        ));

        let mut report = String::new();
        writeln!(report, "Chart review of: {}", input.display())?;
        writeln!(report, "Reviewed at: {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"))?;
        writeln!(report)?;
        writeln!(report, "Total charts: {}", stats.total)?;
        writeln!(report, "Valid: {}", stats.valid)?;
        writeln!(report, "Repaired locally: {}", stats.repaired_locally)?;
        writeln!(report, "Repaired via API: {}", stats.repaired_api)?;
        writeln!(report, "Failed: {}", stats.failed)?;

        fs::write(&report_path, report)
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;
        debug!("Saved review report to {}", report_path.display());
        Ok(())
    }
}
