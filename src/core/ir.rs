use serde_json::{Map, Value};

/// Prefix shared by every widget type rendered by the chart engine.
pub const CHART_ENGINE_PREFIX: &str = "chart.js";

pub const FIELD_TYPE: &str = "type";
pub const FIELD_BLOCKS: &str = "blocks";
pub const FIELD_ITEMS: &str = "items";
pub const FIELD_ROWS: &str = "rows";
pub const FIELD_CELLS: &str = "cells";
pub const FIELD_CHAPTERS: &str = "chapters";
pub const FIELD_WIDGET_ID: &str = "widgetId";
pub const FIELD_WIDGET_TYPE: &str = "widgetType";

pub const MARK_REVIEWED: &str = "_chart_reviewed";
pub const MARK_STATUS: &str = "_chart_review_status";
pub const MARK_METHOD: &str = "_chart_review_method";
pub const MARK_RENDERABLE: &str = "_chart_renderable";
pub const MARK_ERROR_REASON: &str = "_chart_error_reason";

/// JSON truthiness: null, false, zero, and empty strings/sequences/mappings are absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Shape of a block as far as traversal is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Widget,
    List,
    Table,
    Generic,
}

impl BlockKind {
    pub fn of(block: &Map<String, Value>) -> Self {
        match block.get(FIELD_TYPE).and_then(Value::as_str) {
            Some("widget") => BlockKind::Widget,
            Some("list") => BlockKind::List,
            Some("table") => BlockKind::Table,
            _ => BlockKind::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    NotChart,
    Chart,
    WordCloud,
}

impl ChartKind {
    pub fn of_widget_type(widget_type: Option<&str>) -> Self {
        match widget_type {
            Some(t) if t.starts_with(CHART_ENGINE_PREFIX) => {
                if t.to_lowercase().contains("wordcloud") {
                    ChartKind::WordCloud
                } else {
                    ChartKind::Chart
                }
            }
            _ => ChartKind::NotChart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Valid,
    Repaired,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMethod {
    None,
    Local,
    Api,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Valid => "valid",
            ReviewStatus::Repaired => "repaired",
            ReviewStatus::Failed => "failed",
        }
    }
}

impl RepairMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairMethod::None => "none",
            RepairMethod::Local => "local",
            RepairMethod::Api => "api",
        }
    }
}

impl std::fmt::Display for RepairMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable view over a `widget` block mapping.
///
/// All review metadata lives on the mapping itself, so a widget carries its
/// own reviewed marker wherever the document travels.
pub struct ChartWidget<'a> {
    block: &'a mut Map<String, Value>,
}

impl<'a> ChartWidget<'a> {
    pub fn new(block: &'a mut Map<String, Value>) -> Self {
        Self { block }
    }

    pub fn widget_type(&self) -> Option<&str> {
        self.block.get(FIELD_WIDGET_TYPE).and_then(Value::as_str)
    }

    pub fn kind(&self) -> ChartKind {
        ChartKind::of_widget_type(self.widget_type())
    }

    /// Identifier used in log lines; widget ids are not guaranteed unique.
    pub fn widget_id(&self) -> String {
        match self.block.get(FIELD_WIDGET_ID) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn is_reviewed(&self) -> bool {
        self.block.get(MARK_REVIEWED).map(is_truthy).unwrap_or(false)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        self.block
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        self.block
    }

    pub fn mark(&mut self, status: ReviewStatus, method: RepairMethod) {
        self.block.insert(MARK_REVIEWED.to_string(), Value::Bool(true));
        self.block
            .insert(MARK_STATUS.to_string(), Value::String(status.as_str().to_string()));
        self.block
            .insert(MARK_METHOD.to_string(), Value::String(method.as_str().to_string()));
    }

    /// Flag the widget as non-renderable; its data is left as it was.
    pub fn mark_failed(&mut self, reason: &str) {
        self.mark(ReviewStatus::Failed, RepairMethod::None);
        self.block.insert(MARK_RENDERABLE.to_string(), Value::Bool(false));
        self.block
            .insert(MARK_ERROR_REASON.to_string(), Value::String(reason.to_string()));
    }

    /// Swap in repaired content at the same tree position, keeping the
    /// original `widgetId` when the repaired content dropped it.
    pub fn replace_content(&mut self, repaired: Map<String, Value>) {
        let original_id = self
            .block
            .get(FIELD_WIDGET_ID)
            .filter(|v| is_truthy(v))
            .cloned();
        self.block.clear();
        self.block.extend(repaired);
        let has_id = self.block.get(FIELD_WIDGET_ID).map(is_truthy).unwrap_or(false);
        if let (Some(id), false) = (original_id, has_id) {
            self.block.insert(FIELD_WIDGET_ID.to_string(), id);
        }
    }
}
