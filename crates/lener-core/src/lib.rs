//! # LeNER Core
//!
//! Data plumbing shared by every LeNER experiment: adapting the canonical
//! column-formatted corpus to the layout an engine expects, loading it back
//! as tagged sequences, BIO-constrained decoding and token-level metrics.
//!
//! ## Quick Start
//!
//! ```rust
//! use lener_core::metrics::evaluate;
//! use lener_core::TaggedSequence;
//!
//! let reference = vec![TaggedSequence::from_pairs(1, [("TCU", "B-ORGANIZACAO"), ("decidiu", "O")])];
//! let predicted = vec![vec!["B-ORGANIZACAO".to_string(), "O".to_string()]];
//!
//! let report = evaluate(&reference, &predicted, "O", None).unwrap();
//! assert_eq!(report.accuracy(), 1.0);
//! ```
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod tagging;
pub mod types;

// Re-export primary API
pub use dataset::{
    AdaptSummary, FormatSpec, Freshness, Layout, ParseOptions, Separator, adapt, load_file,
    load_split, load_split_with,
};
pub use error::{LenerError, Result};
pub use metrics::ConfusionTable;
pub use tagging::{BioTag, LENER_TAGS, ViterbiDecoder};
pub use types::{EvaluationReport, MetricSet, Split, TaggedSequence};
