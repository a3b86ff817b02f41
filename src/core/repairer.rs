use crate::core::ir::RepairMethod;
use crate::core::validator::{Validator, Verdict};
use anyhow::Result;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Result of one repair attempt on a chart widget.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Repaired {
        method: RepairMethod,
        widget: Map<String, Value>,
        changes: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

pub trait Repairer: Send + Sync {
    /// Try to turn an invalid widget into a valid one. The input is never
    /// modified; a successful outcome carries the full replacement content.
    fn repair(&self, widget: &Map<String, Value>, verdict: &Verdict) -> Result<RepairOutcome>;
}

/// A remote (typically LLM-backed) repair function. `Ok(None)` means the
/// backend had nothing to offer and the next one should be tried.
pub type RemoteRepairFn =
    Box<dyn Fn(&Map<String, Value>, &Verdict) -> Result<Option<Map<String, Value>>> + Send + Sync>;

/// Tries cheap local fixes first and falls back to remote functions in the
/// order they were supplied. Every candidate is re-validated.
pub struct LocalFirstRepairer {
    validator: Arc<dyn Validator>,
    remote_fns: Vec<RemoteRepairFn>,
}

impl LocalFirstRepairer {
    pub fn new(validator: Arc<dyn Validator>, remote_fns: Vec<RemoteRepairFn>) -> Self {
        if remote_fns.is_empty() {
            warn!("No remote repair functions configured, API chart repair is unavailable");
        } else {
            info!("Configured {} remote repair function(s)", remote_fns.len());
        }
        Self { validator, remote_fns }
    }

    fn repair_locally(&self, widget: &Map<String, Value>) -> (Map<String, Value>, Vec<String>) {
        let mut fixed = widget.clone();
        let mut changes = Vec::new();

        if let Some(props) = fixed.get_mut("props").and_then(Value::as_object_mut) {
            if props.get("options").map(|o| !o.is_object()).unwrap_or(false) {
                props.insert("options".to_string(), Value::Object(Map::new()));
                changes.push("reset invalid props.options".to_string());
            }
        }

        if !fixed.get("data").map(Value::is_object).unwrap_or(false) {
            fixed.insert("data".to_string(), Value::Object(Map::new()));
            changes.push("rebuilt data mapping".to_string());
        }
        if let Some(data) = fixed.get_mut("data").and_then(Value::as_object_mut) {
            repair_data(data, &mut changes);
        }

        (fixed, changes)
    }
}

fn repair_data(data: &mut Map<String, Value>, changes: &mut Vec<String>) {
    if !data.get("datasets").map(Value::is_array).unwrap_or(false) {
        data.insert("datasets".to_string(), Value::Array(Vec::new()));
        changes.push("rebuilt datasets sequence".to_string());
    }
    if let Some(Value::Array(datasets)) = data.get_mut("datasets") {
        let before = datasets.len();
        datasets.retain(Value::is_object);
        if datasets.len() != before {
            changes.push(format!("dropped {} non-mapping dataset(s)", before - datasets.len()));
        }
        for (idx, ds) in datasets.iter_mut().enumerate() {
            let Some(ds) = ds.as_object_mut() else { continue };
            if let Some(series) = coerce_series(ds.get("data")) {
                ds.insert("data".to_string(), Value::Array(series));
                changes.push(format!("coerced datasets[{idx}].data to a sequence"));
            }
        }
    }

    let longest = data
        .get("datasets")
        .and_then(Value::as_array)
        .and_then(|list| {
            list.iter()
                .filter_map(|ds| ds.get("data").and_then(Value::as_array))
                .map(Vec::len)
                .max()
        })
        .unwrap_or(0);
    if let Some(Value::Array(labels)) = data.get_mut("labels") {
        if longest > 0 && labels.len() != longest {
            let before = labels.len();
            labels.truncate(longest);
            while labels.len() < longest {
                labels.push(Value::String(format!("点{}", labels.len() + 1)));
            }
            changes.push(format!("resized labels from {before} to {longest}"));
        }
    }
}

/// Box a closure as a [`RemoteRepairFn`], pinning its signature.
pub fn remote_fn<F>(f: F) -> RemoteRepairFn
where
    F: Fn(&Map<String, Value>, &Verdict) -> Result<Option<Map<String, Value>>> + Send + Sync + 'static,
{
    Box::new(f)
}

/// `None` when the series is already a sequence.
fn coerce_series(series: Option<&Value>) -> Option<Vec<Value>> {
    match series {
        Some(Value::Array(_)) => None,
        Some(Value::Object(points)) => Some(points.values().cloned().collect()),
        Some(Value::Null) | None => Some(Vec::new()),
        Some(scalar) => Some(vec![scalar.clone()]),
    }
}

impl Repairer for LocalFirstRepairer {
    fn repair(&self, widget: &Map<String, Value>, verdict: &Verdict) -> Result<RepairOutcome> {
        let (fixed, changes) = self.repair_locally(widget);
        if !changes.is_empty() && self.validator.validate(&fixed).is_valid {
            return Ok(RepairOutcome::Repaired {
                method: RepairMethod::Local,
                widget: fixed,
                changes,
            });
        }
        debug!("Local repair did not produce a valid chart, trying remote repair");

        for (idx, remote) in self.remote_fns.iter().enumerate() {
            match remote(&fixed, verdict) {
                Ok(Some(candidate)) => {
                    if self.validator.validate(&candidate).is_valid {
                        return Ok(RepairOutcome::Repaired {
                            method: RepairMethod::Api,
                            widget: candidate,
                            changes: vec![format!("remote repair #{} returned a valid chart", idx + 1)],
                        });
                    }
                    debug!("Remote repair #{} returned a chart that still fails validation", idx + 1);
                }
                Ok(None) => debug!("Remote repair #{} returned nothing", idx + 1),
                Err(e) => warn!("Remote repair #{} failed: {}", idx + 1, e),
            }
        }

        Ok(RepairOutcome::Failed {
            reason: verdict.error_summary(3),
        })
    }
}
