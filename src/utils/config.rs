// 环境变量驱动的配置，进程启动时读取一次
use anyhow::{anyhow, bail, Result};
use log::info;
use std::path::PathBuf;

pub const ENV_SAVE_ON_REPAIR: &str = "CHART_REVIEW_SAVE_ON_REPAIR";
pub const ENV_MAX_ERROR_REASONS: &str = "CHART_REVIEW_MAX_ERROR_REASONS";
pub const ENV_IR_OUTPUT_DIR: &str = "DOCUMENT_IR_OUTPUT_DIR";
pub const ENV_LOG: &str = "CHART_REVIEW_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Persist the document after a run that repaired at least one chart.
    pub save_on_repair: bool,
    /// How many validator errors end up in a failed chart's reason.
    pub max_error_reasons: usize,
    /// Where batch runs write reviewed IR files.
    pub ir_output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_on_repair: true,
            max_error_reasons: 3,
            ir_output_dir: PathBuf::from("final_reports/ir"),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup(ENV_SAVE_ON_REPAIR) {
            settings.save_on_repair = parse_bool(&raw)
                .ok_or_else(|| anyhow!("{ENV_SAVE_ON_REPAIR} must be a boolean, got {raw:?}"))?;
        }
        if let Some(raw) = lookup(ENV_MAX_ERROR_REASONS) {
            settings.max_error_reasons = raw
                .trim()
                .parse()
                .map_err(|e| anyhow!("{ENV_MAX_ERROR_REASONS} must be a positive integer: {e}"))?;
            if settings.max_error_reasons == 0 {
                bail!("{ENV_MAX_ERROR_REASONS} must be a positive integer, got 0");
            }
        }
        if let Some(raw) = lookup(ENV_IR_OUTPUT_DIR) {
            if !raw.trim().is_empty() {
                settings.ir_output_dir = PathBuf::from(raw.trim());
            }
        }

        Ok(settings)
    }

    pub fn log_summary(&self) {
        info!(
            "Chart review settings: save_on_repair={}, max_error_reasons={}, ir_output_dir={}",
            self.save_on_repair,
            self.max_error_reasons,
            self.ir_output_dir.display()
        );
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Initialise `env_logger`, reading the filter from `CHART_REVIEW_LOG` and
/// falling back to `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let env = env_logger::Env::default()
        .filter_or(ENV_LOG, std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    if env_logger::Builder::from_env(env).try_init().is_err() {
        // Logger already initialized
    }
}
