use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Writer is responsible for persisting a reviewed document IR to durable storage.
pub trait Writer: Send + Sync {
    /// Serialize the whole document to `out_path`, creating parent directories as needed.
    fn write_document(&self, document: &Value, out_path: &Path) -> Result<()>;
}

/// Pretty-printed UTF-8 JSON; non-ASCII text is written as-is.
#[derive(Debug, Default, Clone)]
pub struct JsonWriter;

impl Writer for JsonWriter {
    fn write_document(&self, document: &Value, out_path: &Path) -> Result<()> {
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let body = serde_json::to_string_pretty(document)?;
        fs::write(out_path, body)
            .with_context(|| format!("Failed to write IR file: {}", out_path.display()))?;
        Ok(())
    }
}
