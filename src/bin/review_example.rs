use chart_review::core::ir::{MARK_ERROR_REASON, MARK_STATUS};
use chart_review::review_document_charts;
use serde_json::{json, Value};

fn main() -> anyhow::Result<()> {
    chart_review::utils::config::init_logging();

    let mut document = json!({
        "chapters": [{
            "title": "Quarterly sales",
            "data": {
                "labels": ["Q1", "Q2", "Q3"],
                "datasets": [{"label": "North", "data": [12, 19, 7]}, {"label": "South", "data": [5, 8, 11]}]
            },
            "blocks": [
                {"type": "paragraph", "text": "Revenue by region."},
                {"type": "widget", "widgetId": "sales-bar", "widgetType": "chart.js/bar", "data": {"datasets": []}},
                {"type": "table", "rows": [{"cells": [{"blocks": [
                    {"type": "widget", "widgetId": "broken", "widgetType": "chart.js/line", "data": {"datasets": "n/a"}}
                ]}]}]}
            ]
        }]
    });

    review_document_charts(&mut document, None);

    for (path, block) in [
        ("sales-bar", &document["chapters"][0]["blocks"][1]),
        ("broken", &document["chapters"][0]["blocks"][2]["rows"][0]["cells"][0]["blocks"][0]),
    ] {
        println!(
            "[{}] status={} reason={}",
            path,
            block[MARK_STATUS],
            block.get(MARK_ERROR_REASON).cloned().unwrap_or(Value::Null)
        );
    }

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
