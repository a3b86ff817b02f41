//! Fills structurally missing but inferable fields on chart widgets before
//! they are validated. Nothing here invents semantic content: values are
//! either moved from elsewhere in the widget, borrowed from the owning
//! chapter, or positional placeholders for axis labels.

use crate::core::ir::{is_truthy, BlockKind, ChartKind, FIELD_WIDGET_TYPE};
use crate::utils::merge::merge_maps;
use serde_json::{Map, Value};

/// The parts of a chapter a widget may fall back on.
///
/// Captured by value so the chapter's block forest can be walked mutably
/// while the fallback data stays readable.
#[derive(Debug, Clone, Default)]
pub struct ChapterContext {
    pub data: Option<Map<String, Value>>,
}

impl ChapterContext {
    pub fn from_chapter(chapter: &Map<String, Value>) -> Self {
        Self {
            data: chapter.get("data").and_then(Value::as_object).cloned(),
        }
    }
}

/// Normalize a chart widget in place. Non-chart blocks are left untouched.
pub fn normalize_chart_block(block: &mut Map<String, Value>, chapter: Option<&ChapterContext>) {
    if BlockKind::of(block) != BlockKind::Widget {
        return;
    }
    let widget_type = block.get(FIELD_WIDGET_TYPE).and_then(Value::as_str);
    if ChartKind::of_widget_type(widget_type) == ChartKind::NotChart {
        return;
    }

    ensure_mapping(block, "props");
    merge_top_level_scales(block);
    ensure_mapping(block, "data");
    if let Some(ctx) = chapter {
        apply_chapter_fallback(block, ctx);
    }
    synthesize_labels(block);
}

/// True when `data` has no dataset carrying a non-empty `data` series.
pub fn is_chart_data_empty(data: Option<&Value>) -> bool {
    let Some(datasets) = data
        .and_then(Value::as_object)
        .and_then(|d| d.get("datasets"))
        .and_then(Value::as_array)
    else {
        return true;
    };

    !datasets.iter().any(|ds| {
        ds.get("data")
            .and_then(Value::as_array)
            .map(|series| !series.is_empty())
            .unwrap_or(false)
    })
}

fn ensure_mapping(block: &mut Map<String, Value>, key: &str) {
    if !block.get(key).map(Value::is_object).unwrap_or(false) {
        block.insert(key.to_string(), Value::Object(Map::new()));
    }
}

/// Legacy widgets carry `scales` at the top level; fold them into
/// `props.options.scales` so the renderer sees a single configuration.
fn merge_top_level_scales(block: &mut Map<String, Value>) {
    let Some(Value::Object(scales)) = block.get("scales").cloned() else {
        return;
    };
    let Some(props) = block.get_mut("props").and_then(Value::as_object_mut) else {
        return;
    };

    let options = props
        .get("options")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut overlay = Map::new();
    overlay.insert("scales".to_string(), Value::Object(scales));
    props.insert("options".to_string(), Value::Object(merge_maps(&options, &overlay)));
}

fn apply_chapter_fallback(block: &mut Map<String, Value>, ctx: &ChapterContext) {
    if !is_chart_data_empty(block.get("data")) {
        return;
    }
    let Some(chapter_data) = ctx.data.as_ref() else {
        return;
    };
    let Some(fallback) = chapter_data.get("datasets").and_then(Value::as_array) else {
        return;
    };
    if fallback.is_empty() {
        return;
    }

    let mut merged = block
        .get("data")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    merged.insert("datasets".to_string(), Value::Array(fallback.clone()));

    let has_labels = merged.get("labels").map(is_truthy).unwrap_or(false);
    if !has_labels {
        if let Some(labels @ Value::Array(_)) = chapter_data.get("labels") {
            merged.insert("labels".to_string(), labels.clone());
        }
    }

    block.insert("data".to_string(), Value::Object(merged));
}

fn synthesize_labels(block: &mut Map<String, Value>) {
    let Some(data) = block.get_mut("data").and_then(Value::as_object_mut) else {
        return;
    };
    if data.get("labels").map(is_truthy).unwrap_or(false) {
        return;
    }

    let labels: Vec<Value> = match data
        .get("datasets")
        .and_then(Value::as_array)
        .and_then(|datasets| datasets.first())
        .and_then(|first| first.get("data"))
        .and_then(Value::as_array)
    {
        Some(series) => series
            .iter()
            .enumerate()
            .map(|(idx, point)| Value::String(point_label(idx, point)))
            .collect(),
        None => return,
    };

    if !labels.is_empty() {
        data.insert("labels".to_string(), Value::Array(labels));
    }
}

fn point_label(idx: usize, point: &Value) -> String {
    let picked = point.as_object().and_then(|p| {
        ["x", "label"]
            .iter()
            .filter_map(|key| p.get(*key))
            .find(|v| is_truthy(v))
    });
    match picked {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => format!("点{}", idx + 1),
    }
}
