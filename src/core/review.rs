//! Review orchestration: walks a document IR, runs every chart widget
//! through skip / normalize / validate / repair, and records the outcome on
//! the widget itself so later passes leave it alone.

use crate::core::ir::{is_truthy, ChartKind, ChartWidget, RepairMethod, ReviewStatus, FIELD_BLOCKS, FIELD_CHAPTERS};
use crate::core::normalizer::{normalize_chart_block, ChapterContext};
use crate::core::repairer::{LocalFirstRepairer, RemoteRepairFn, RepairOutcome, Repairer};
use crate::core::traversal::walk_blocks;
use crate::core::validator::{StructuralValidator, Validator, Verdict};
use crate::core::writer::{JsonWriter, Writer};
use crate::utils::config::Settings;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Counters for one review run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub total: usize,
    pub valid: usize,
    pub repaired_locally: usize,
    pub repaired_api: usize,
    pub failed: usize,
}

impl ReviewStats {
    pub fn repaired(&self) -> usize {
        self.repaired_locally + self.repaired_api
    }

    pub fn absorb(&mut self, other: &ReviewStats) {
        self.total += other.total;
        self.valid += other.valid;
        self.repaired_locally += other.repaired_locally;
        self.repaired_api += other.repaired_api;
        self.failed += other.failed;
    }
}

/// Per-call switches for [`ChartReviewService::review_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOptions {
    pub reset_stats: bool,
    pub save_on_repair: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            reset_stats: true,
            save_on_repair: true,
        }
    }
}

impl ReviewOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            save_on_repair: settings.save_on_repair,
            ..Self::default()
        }
    }
}

pub struct ChartReviewService {
    validator: Arc<dyn Validator>,
    repairer: Box<dyn Repairer>,
    writer: Box<dyn Writer>,
    max_error_reasons: usize,
    default_options: ReviewOptions,
    stats: Mutex<ReviewStats>,
}

impl ChartReviewService {
    pub fn new(validator: Arc<dyn Validator>, repairer: Box<dyn Repairer>, writer: Box<dyn Writer>) -> Self {
        Self {
            validator,
            repairer,
            writer,
            max_error_reasons: Settings::default().max_error_reasons,
            default_options: ReviewOptions::default(),
            stats: Mutex::new(ReviewStats::default()),
        }
    }

    /// Structural validator, local-first repairer over `remote_fns`, JSON writer.
    pub fn from_settings(settings: &Settings, remote_fns: Vec<RemoteRepairFn>) -> Self {
        let validator: Arc<dyn Validator> = Arc::new(StructuralValidator);
        let repairer = LocalFirstRepairer::new(validator.clone(), remote_fns);
        let service = Self::new(validator, Box::new(repairer), Box::new(JsonWriter))
            .with_max_error_reasons(settings.max_error_reasons)
            .with_default_options(ReviewOptions::from_settings(settings));
        info!("Chart review service initialized");
        service
    }

    pub fn with_max_error_reasons(mut self, limit: usize) -> Self {
        self.max_error_reasons = limit;
        self
    }

    pub fn with_default_options(mut self, options: ReviewOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Options a run uses when the caller has no preference of its own.
    pub fn default_options(&self) -> ReviewOptions {
        self.default_options
    }

    /// Process-wide instance configured from the environment, built on first use.
    pub fn global() -> &'static ChartReviewService {
        static SERVICE: OnceLock<ChartReviewService> = OnceLock::new();
        SERVICE.get_or_init(|| {
            let settings = Settings::from_env().unwrap_or_else(|e| {
                warn!("Invalid chart review settings, using defaults: {:#}", e);
                Settings::default()
            });
            ChartReviewService::from_settings(&settings, Vec::new())
        })
    }

    /// Snapshot of the statistics accumulated since the last reset.
    pub fn stats(&self) -> ReviewStats {
        *self.stats_guard()
    }

    pub fn reset_stats(&self) {
        *self.stats_guard() = ReviewStats::default();
    }

    fn stats_guard(&self) -> MutexGuard<'_, ReviewStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Review and repair every chart widget in `document`, in place.
    ///
    /// When at least one chart was repaired and `ir_path` is given, the whole
    /// document is written there (unless `save_on_repair` is off). Write
    /// failures are logged, never returned.
    pub fn review_document<'a>(
        &self,
        document: &'a mut Value,
        ir_path: Option<&Path>,
        options: ReviewOptions,
    ) -> &'a mut Value {
        if options.reset_stats {
            self.reset_stats();
        }

        if !is_truthy(document) {
            warn!("Document IR is empty, skipping chart review");
            return document;
        }

        let mut run = ReviewStats::default();
        let mut has_repairs = false;

        let chapters = if document.is_array() {
            document.as_array_mut()
        } else {
            document.get_mut(FIELD_CHAPTERS).and_then(Value::as_array_mut)
        };
        for chapter in chapters.into_iter().flatten() {
            let Some(chapter) = chapter.as_object_mut() else {
                continue;
            };
            let context = ChapterContext::from_chapter(chapter);
            if let Some(Value::Array(blocks)) = chapter.get_mut(FIELD_BLOCKS) {
                has_repairs |= walk_blocks(blocks, Some(&context), &mut |block, ctx| {
                    self.review_chart_block(block, ctx, &mut run)
                });
            }
        }

        let cumulative = {
            let mut guard = self.stats_guard();
            guard.absorb(&run);
            *guard
        };
        log_stats(&cumulative);

        if has_repairs && options.save_on_repair {
            if let Some(path) = ir_path {
                self.save_document(document, path);
            }
        }

        document
    }

    /// Run one block through the review pipeline. Returns true only when the
    /// widget's content was replaced by a repair.
    fn review_chart_block(
        &self,
        block: &mut Map<String, Value>,
        chapter: Option<&ChapterContext>,
        stats: &mut ReviewStats,
    ) -> bool {
        let mut widget = ChartWidget::new(block);
        let kind = widget.kind();
        if kind == ChartKind::NotChart {
            return false;
        }

        let widget_id = widget.widget_id();
        if widget.is_reviewed() {
            debug!("Chart {} already reviewed, skipping", widget_id);
            return false;
        }

        stats.total += 1;

        if kind == ChartKind::WordCloud {
            stats.valid += 1;
            widget.mark(ReviewStatus::Valid, RepairMethod::None);
            return false;
        }

        normalize_chart_block(widget.as_map_mut(), chapter);

        let verdict = self.validator.validate(widget.as_map());
        if verdict.is_valid {
            stats.valid += 1;
            widget.mark(ReviewStatus::Valid, RepairMethod::None);
            if !verdict.warnings.is_empty() {
                debug!("Chart {} passed validation with warnings: {:?}", widget_id, verdict.warnings);
            }
            return false;
        }

        warn!("Chart {} failed validation: {:?}", widget_id, verdict.errors);

        let outcome = self.repairer.repair(widget.as_map(), &verdict).unwrap_or_else(|e| {
            warn!("Repairer errored on chart {}: {:#}", widget_id, e);
            RepairOutcome::Failed {
                reason: e.to_string(),
            }
        });

        match outcome {
            RepairOutcome::Repaired {
                method,
                widget: content,
                changes,
            } if !content.is_empty() => {
                let method = match method {
                    RepairMethod::None => RepairMethod::Local,
                    other => other,
                };
                widget.replace_content(content);
                match method {
                    RepairMethod::Api => stats.repaired_api += 1,
                    _ => stats.repaired_locally += 1,
                }
                widget.mark(ReviewStatus::Repaired, method);
                info!("Chart {} repaired (method: {}): {:?}", widget_id, method, changes);
                true
            }
            RepairOutcome::Repaired { .. } => {
                self.mark_unrenderable(&mut widget, &verdict, stats);
                warn!("Chart {} repair returned no content, marked not renderable", widget_id);
                false
            }
            RepairOutcome::Failed { reason } => {
                self.mark_unrenderable(&mut widget, &verdict, stats);
                warn!("Chart {} could not be repaired ({}), marked not renderable", widget_id, reason);
                false
            }
        }
    }

    fn mark_unrenderable(
        &self,
        widget: &mut ChartWidget<'_>,
        verdict: &Verdict,
        stats: &mut ReviewStats,
    ) {
        stats.failed += 1;
        widget.mark_failed(&verdict.error_summary(self.max_error_reasons));
    }

    fn save_document(&self, document: &Value, path: &Path) {
        match self.writer.write_document(document, path) {
            Ok(()) => info!("Repaired IR saved to {}", path.display()),
            Err(e) => error!("Failed to save IR file {}: {:#}", path.display(), e),
        }
    }
}

fn log_stats(stats: &ReviewStats) {
    if stats.total == 0 {
        debug!("No charts needed review");
        return;
    }
    info!(
        "Chart review finished: total {}, valid {}, repaired {} (local {}, api {}), failed {}",
        stats.total,
        stats.valid,
        stats.repaired(),
        stats.repaired_locally,
        stats.repaired_api,
        stats.failed
    );
}

/// Review `document` with the process-wide service and its configured options.
pub fn review_document_charts<'a>(document: &'a mut Value, ir_path: Option<&Path>) -> &'a mut Value {
    let service = ChartReviewService::global();
    service.review_document(document, ir_path, service.default_options())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::{MARK_ERROR_REASON, MARK_METHOD, MARK_RENDERABLE, MARK_REVIEWED, MARK_STATUS};
    use anyhow::Result;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedValidator {
        verdict: Verdict,
        calls: Arc<AtomicUsize>,
    }

    impl Validator for FixedValidator {
        fn validate(&self, _widget: &Map<String, Value>) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    struct FixedRepairer {
        outcome: Result<RepairOutcome, String>,
        calls: Arc<AtomicUsize>,
    }

    impl Repairer for FixedRepairer {
        fn repair(&self, _widget: &Map<String, Value>, _verdict: &Verdict) -> Result<RepairOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map_err(anyhow::Error::msg)
        }
    }

    struct Harness {
        service: ChartReviewService,
        validations: Arc<AtomicUsize>,
        repairs: Arc<AtomicUsize>,
    }

    fn harness(verdict: Verdict, outcome: Result<RepairOutcome, String>) -> Harness {
        let validations = Arc::new(AtomicUsize::new(0));
        let repairs = Arc::new(AtomicUsize::new(0));
        let service = ChartReviewService::new(
            Arc::new(FixedValidator {
                verdict,
                calls: validations.clone(),
            }),
            Box::new(FixedRepairer {
                outcome,
                calls: repairs.clone(),
            }),
            Box::new(JsonWriter),
        );
        Harness {
            service,
            validations,
            repairs,
        }
    }

    fn invalid() -> Verdict {
        Verdict::invalid(vec!["e1".into(), "e2".into(), "e3".into(), "e4".into()])
    }

    fn doc_with(block: Value) -> Value {
        json!({"chapters": [{"blocks": [block]}]})
    }

    fn first_block(doc: &Value) -> &Value {
        &doc["chapters"][0]["blocks"][0]
    }

    #[test]
    fn valid_chart_is_marked_and_counted() {
        let h = harness(Verdict::valid(), Err("unused".into()));
        let mut doc = doc_with(json!({"type": "widget", "widgetType": "chart.js/bar"}));
        h.service.review_document(&mut doc, None, ReviewOptions::default());

        let block = first_block(&doc);
        assert_eq!(block[MARK_REVIEWED], json!(true));
        assert_eq!(block[MARK_STATUS], json!("valid"));
        assert_eq!(block[MARK_METHOD], json!("none"));
        assert_eq!(h.service.stats(), ReviewStats { total: 1, valid: 1, ..ReviewStats::default() });
        assert_eq!(h.repairs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn word_cloud_skips_collaborators() {
        let h = harness(invalid(), Err("unused".into()));
        let mut doc = doc_with(json!({"type": "widget", "widgetType": "chart.js/wordCloud"}));
        h.service.review_document(&mut doc, None, ReviewOptions::default());

        assert_eq!(first_block(&doc)[MARK_STATUS], json!("valid"));
        assert!(first_block(&doc).get("props").is_none());
        assert_eq!(h.validations.load(Ordering::SeqCst), 0);
        assert_eq!(h.repairs.load(Ordering::SeqCst), 0);
        assert_eq!(h.service.stats().valid, 1);
    }

    #[test]
    fn non_chart_widgets_are_ignored() {
        let h = harness(invalid(), Err("unused".into()));
        let mut doc = json!({"chapters": [{"blocks": [
            {"type": "widget", "widgetType": "kpi/card"},
            {"type": "widget", "widgetType": 3},
            {"type": "widget"}
        ]}]});
        let before = doc.clone();
        h.service.review_document(&mut doc, None, ReviewOptions::default());
        assert_eq!(doc, before);
        assert_eq!(h.service.stats(), ReviewStats::default());
    }

    #[test]
    fn repair_replaces_content_and_keeps_id() {
        let repaired = json!({"type": "widget", "widgetType": "chart.js/bar", "data": {"datasets": [{"data": [1]}]}});
        let outcome = RepairOutcome::Repaired {
            method: RepairMethod::Api,
            widget: repaired.as_object().cloned().unwrap_or_default(),
            changes: vec!["rebuilt".into()],
        };
        let h = harness(invalid(), Ok(outcome));
        let mut doc = doc_with(json!({"type": "widget", "widgetId": "c-9", "widgetType": "chart.js/bar", "junk": 1}));
        h.service.review_document(&mut doc, None, ReviewOptions::default());

        let block = first_block(&doc);
        assert_eq!(block["widgetId"], json!("c-9"));
        assert!(block.get("junk").is_none());
        assert_eq!(block[MARK_STATUS], json!("repaired"));
        assert_eq!(block[MARK_METHOD], json!("api"));
        assert_eq!(h.service.stats().repaired_api, 1);
    }

    #[test]
    fn unspecified_repair_method_counts_as_local() {
        let outcome = RepairOutcome::Repaired {
            method: RepairMethod::None,
            widget: json!({"widgetType": "chart.js/bar"}).as_object().cloned().unwrap_or_default(),
            changes: Vec::new(),
        };
        let h = harness(invalid(), Ok(outcome));
        let mut doc = doc_with(json!({"type": "widget", "widgetType": "chart.js/bar"}));
        h.service.review_document(&mut doc, None, ReviewOptions::default());
        assert_eq!(first_block(&doc)[MARK_METHOD], json!("local"));
        assert_eq!(h.service.stats().repaired_locally, 1);
    }

    #[test]
    fn failed_repair_marks_widget_unrenderable() {
        let h = harness(invalid(), Ok(RepairOutcome::Failed { reason: "no luck".into() }));
        let mut doc = doc_with(json!({"type": "widget", "widgetType": "chart.js/pie", "data": {"keep": true}}));
        h.service.review_document(&mut doc, None, ReviewOptions::default());

        let block = first_block(&doc);
        assert_eq!(block[MARK_RENDERABLE], json!(false));
        assert_eq!(block[MARK_STATUS], json!("failed"));
        assert_eq!(block[MARK_METHOD], json!("none"));
        assert_eq!(block[MARK_ERROR_REASON], json!("e1; e2; e3"));
        assert_eq!(block["data"]["keep"], json!(true));
        assert_eq!(h.service.stats().failed, 1);
    }

    #[test]
    fn repairer_error_and_empty_content_are_failures() {
        for outcome in [
            Err("backend exploded".to_string()),
            Ok(RepairOutcome::Repaired {
                method: RepairMethod::Local,
                widget: Map::new(),
                changes: Vec::new(),
            }),
        ] {
            let h = harness(invalid(), outcome);
            let mut doc = doc_with(json!({"type": "widget", "widgetType": "chart.js/bar"}));
            h.service.review_document(&mut doc, None, ReviewOptions::default());
            assert_eq!(first_block(&doc)[MARK_STATUS], json!("failed"));
            assert_eq!(h.service.stats().failed, 1);
        }
    }

    #[test]
    fn reviewed_widgets_are_never_revisited() {
        let h = harness(invalid(), Ok(RepairOutcome::Failed { reason: String::new() }));
        let mut doc = doc_with(json!({"type": "widget", "widgetType": "chart.js/bar"}));
        h.service.review_document(&mut doc, None, ReviewOptions::default());
        h.service.review_document(&mut doc, None, ReviewOptions::default());

        assert_eq!(h.validations.load(Ordering::SeqCst), 1);
        assert_eq!(h.repairs.load(Ordering::SeqCst), 1);
        assert_eq!(h.service.stats(), ReviewStats::default());
    }

    #[test]
    fn stats_accumulate_without_reset() {
        let h = harness(Verdict::valid(), Err("unused".into()));
        let keep = ReviewOptions {
            reset_stats: false,
            ..ReviewOptions::default()
        };
        let mut first = doc_with(json!({"type": "widget", "widgetType": "chart.js/bar"}));
        let mut second = doc_with(json!({"type": "widget", "widgetType": "chart.js/line"}));
        h.service.review_document(&mut first, None, keep);
        h.service.review_document(&mut second, None, keep);
        assert_eq!(h.service.stats().total, 2);

        h.service.reset_stats();
        assert_eq!(h.service.stats(), ReviewStats::default());
    }

    #[test]
    fn configured_save_default_is_honoured() {
        let settings = Settings {
            save_on_repair: false,
            ..Settings::default()
        };
        let service = ChartReviewService::from_settings(&settings, Vec::new());
        assert!(!service.default_options().save_on_repair);
        assert!(service.default_options().reset_stats);

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.json");
        let mut doc = doc_with(json!({
            "type": "widget",
            "widgetType": "chart.js/bar",
            "data": {"datasets": [{"data": 1}]}
        }));
        service.review_document(&mut doc, Some(&path), service.default_options());

        assert_eq!(first_block(&doc)[MARK_STATUS], json!("repaired"));
        assert!(!path.exists());
    }

    #[test]
    fn zero_reason_limit_still_yields_a_reason() {
        let h = harness(invalid(), Ok(RepairOutcome::Failed { reason: String::new() }));
        let service = h.service.with_max_error_reasons(0);
        let mut doc = doc_with(json!({"type": "widget", "widgetType": "chart.js/bar"}));
        service.review_document(&mut doc, None, ReviewOptions::default());
        assert_eq!(first_block(&doc)[MARK_ERROR_REASON], json!("e1"));
    }

    #[test]
    fn empty_documents_are_returned_untouched() {
        let h = harness(Verdict::valid(), Err("unused".into()));
        for mut doc in [json!(null), json!({}), json!([])] {
            let before = doc.clone();
            h.service.review_document(&mut doc, None, ReviewOptions::default());
            assert_eq!(doc, before);
        }
    }

    #[test]
    fn bare_chapter_sequence_is_accepted() {
        let h = harness(Verdict::valid(), Err("unused".into()));
        let mut doc = json!([
            "not a chapter",
            {"blocks": [{"type": "widget", "widgetType": "chart.js/bar"}]}
        ]);
        h.service.review_document(&mut doc, None, ReviewOptions::default());
        assert_eq!(doc[1]["blocks"][0][MARK_STATUS], json!("valid"));
    }
}
