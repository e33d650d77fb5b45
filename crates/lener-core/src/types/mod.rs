pub mod report;
pub mod sequence;

pub use report::{EvaluationReport, MetricSet};
pub use sequence::{Split, TaggedSequence};
