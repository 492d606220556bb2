pub mod baseline;
pub mod delta;
pub mod engine;
pub mod metric;

pub use baseline::{record_baseline, BaselineStore, MemoryBaselineStore, SessionKey};
pub use delta::{normalize_delta, normalize_deltas, DeltaTransformation};
pub use engine::{BaselineView, MetricInputs, ScoreBreakdown, ScoringEngine};
pub use metric::{Classification, ClassificationThresholds, MetricKey, MetricResult, Status};
