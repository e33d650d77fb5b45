pub mod adapter;
pub mod format;
pub mod loader;
pub mod manifest;

pub use adapter::{AdaptSummary, adapt, sample_size};
pub use format::{CRF_HEADER, FormatSpec, Freshness, Layout, Separator};
pub use loader::{ParseOptions, has_crf_header, load_file, load_split, load_split_with};
pub use manifest::{AdaptManifest, MANIFEST_FILE};
