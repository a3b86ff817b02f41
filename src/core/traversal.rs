//! Recursive walk over a chapter's block forest.
//!
//! Four containment shapes are followed: a block's own `blocks`, `list`
//! items that are themselves block sequences, and `table` cells carrying
//! `blocks`. Anything that is not a mapping where a block is expected is
//! skipped without complaint.

use crate::core::ir::{BlockKind, FIELD_BLOCKS, FIELD_CELLS, FIELD_ITEMS, FIELD_ROWS};
use crate::core::normalizer::ChapterContext;
use serde_json::{Map, Value};

/// Walk `blocks`, calling `visit` on every `widget` block reachable by
/// containment. Returns true if any visit reported a repair.
///
/// Every container is visited even after a repair has been seen.
pub fn walk_blocks<F>(blocks: &mut [Value], chapter: Option<&ChapterContext>, visit: &mut F) -> bool
where
    F: FnMut(&mut Map<String, Value>, Option<&ChapterContext>) -> bool,
{
    let mut repaired = false;

    for block in blocks.iter_mut() {
        let Some(block) = block.as_object_mut() else {
            continue;
        };
        let kind = BlockKind::of(block);

        if kind == BlockKind::Widget {
            repaired |= visit(block, chapter);
        }

        if let Some(Value::Array(nested)) = block.get_mut(FIELD_BLOCKS) {
            repaired |= walk_blocks(nested, chapter, visit);
        }

        match kind {
            BlockKind::List => {
                if let Some(Value::Array(items)) = block.get_mut(FIELD_ITEMS) {
                    for item in items.iter_mut() {
                        // An item that is a lone block rather than a block sequence is not followed.
                        if let Value::Array(item_blocks) = item {
                            repaired |= walk_blocks(item_blocks, chapter, visit);
                        }
                    }
                }
            }
            BlockKind::Table => {
                if let Some(Value::Array(rows)) = block.get_mut(FIELD_ROWS) {
                    for row in rows.iter_mut() {
                        let Some(Value::Array(cells)) = row.get_mut(FIELD_CELLS) else {
                            continue;
                        };
                        for cell in cells.iter_mut() {
                            if let Some(Value::Array(cell_blocks)) = cell.get_mut(FIELD_BLOCKS) {
                                repaired |= walk_blocks(cell_blocks, chapter, visit);
                            }
                        }
                    }
                }
            }
            BlockKind::Widget | BlockKind::Generic => {}
        }
    }

    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::FIELD_WIDGET_ID;
    use serde_json::json;

    fn visited_ids(mut blocks: Value) -> Vec<String> {
        let mut seen = Vec::new();
        let list = blocks.as_array_mut().expect("array");
        walk_blocks(list, None, &mut |block, _| {
            seen.push(block[FIELD_WIDGET_ID].as_str().unwrap_or_default().to_string());
            false
        });
        seen
    }

    fn widget(id: &str) -> Value {
        json!({"type": "widget", "widgetId": id, "widgetType": "chart.js/bar"})
    }

    #[test]
    fn reaches_every_nesting_shape() {
        let blocks = json!([
            widget("top"),
            {"type": "callout", "blocks": [widget("generic")]},
            {"type": "list", "items": [[widget("list")], [{"type": "paragraph"}]]},
            {"type": "table", "rows": [
                {"cells": [{"blocks": [widget("cell-a")]}, {"text": "x"}]},
                {"cells": [{"blocks": [
                    {"type": "list", "items": [[{"type": "section", "blocks": [widget("deep")]}]]}
                ]}]}
            ]}
        ]);
        assert_eq!(visited_ids(blocks), vec!["top", "generic", "list", "cell-a", "deep"]);
    }

    #[test]
    fn widget_with_child_blocks_is_visited_and_recursed() {
        let mut outer = widget("outer");
        outer["blocks"] = json!([widget("inner")]);
        assert_eq!(visited_ids(json!([outer])), vec!["outer", "inner"]);
    }

    #[test]
    fn list_item_that_is_a_single_block_is_not_followed() {
        let blocks = json!([{"type": "list", "items": [widget("lone"), [widget("seq")]]}]);
        assert_eq!(visited_ids(blocks), vec!["seq"]);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let blocks = json!([
            "text",
            42,
            null,
            {"type": "table", "rows": ["bad", {"cells": "bad"}, {"cells": [1, {"blocks": "bad"}]}]},
            {"type": "list", "items": "bad"},
            {"type": "callout", "blocks": {"not": "a list"}},
            widget("ok")
        ]);
        assert_eq!(visited_ids(blocks), vec!["ok"]);
    }

    #[test]
    fn repair_signal_does_not_short_circuit() {
        let mut blocks = json!([widget("a"), {"type": "callout", "blocks": [widget("b")]}, widget("c")]);
        let mut count = 0;
        let repaired = walk_blocks(blocks.as_array_mut().expect("array"), None, &mut |_, _| {
            count += 1;
            count == 1
        });
        assert!(repaired);
        assert_eq!(count, 3);
    }
}
