pub mod core {
    pub mod ir;
    pub mod normalizer;
    pub mod repairer;
    pub mod review;
    pub mod traversal;
    pub mod validator;
    pub mod writer;
}

pub mod utils {
    pub mod config;
    pub mod ir_processor;
    pub mod merge;
}

pub use crate::core::ir::{ChartKind, ChartWidget, RepairMethod, ReviewStatus};
pub use crate::core::repairer::{remote_fn, LocalFirstRepairer, RemoteRepairFn, RepairOutcome, Repairer};
pub use crate::core::review::{review_document_charts, ChartReviewService, ReviewOptions, ReviewStats};
pub use crate::core::validator::{StructuralValidator, Validator, Verdict};
pub use crate::core::writer::{JsonWriter, Writer};
pub use crate::utils::config::Settings;
