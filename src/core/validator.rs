use serde_json::{Map, Value};

/// Pass/fail verdict returned by a [`Validator`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings: Vec::new(),
        }
    }

    /// Short human-readable summary built from the first `limit` errors.
    /// At least one error is always included.
    pub fn error_summary(&self, limit: usize) -> String {
        if self.errors.is_empty() {
            return "validation failed without specific errors".to_string();
        }
        self.errors
            .iter()
            .take(limit.max(1))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub trait Validator: Send + Sync {
    /// Inspect a chart widget mapping and report whether it can be rendered.
    fn validate(&self, widget: &Map<String, Value>) -> Verdict;
}

/// Checks the structural minimum a chart renderer needs: a datasets
/// sequence whose entries are mappings carrying `data` series.
#[derive(Debug, Default, Clone)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    fn validate(&self, widget: &Map<String, Value>) -> Verdict {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(options) = widget.get("props").and_then(|p| p.get("options")) {
            if !options.is_object() {
                errors.push("props.options must be a mapping".to_string());
            }
        }

        let data = widget.get("data").and_then(Value::as_object);
        let datasets = data.and_then(|d| d.get("datasets"));
        match datasets {
            Some(Value::Array(list)) if list.is_empty() => {
                errors.push("data.datasets is empty".to_string());
            }
            Some(Value::Array(list)) => {
                let label_count = data
                    .and_then(|d| d.get("labels"))
                    .and_then(Value::as_array)
                    .map(Vec::len);
                for (idx, ds) in list.iter().enumerate() {
                    let Some(ds) = ds.as_object() else {
                        errors.push(format!("datasets[{idx}] is not a mapping"));
                        continue;
                    };
                    match ds.get("data") {
                        Some(Value::Array(series)) => {
                            if let Some(n) = label_count {
                                if n != series.len() {
                                    warnings.push(format!(
                                        "datasets[{idx}] has {} points but labels has {n}",
                                        series.len()
                                    ));
                                }
                            }
                        }
                        _ => errors.push(format!("datasets[{idx}].data is missing or not a sequence")),
                    }
                }
            }
            Some(_) => errors.push("data.datasets is not a sequence".to_string()),
            None => errors.push("data.datasets is missing".to_string()),
        }

        Verdict {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
