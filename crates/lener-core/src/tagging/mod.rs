pub mod bio_tags;
pub mod viterbi;

pub use bio_tags::{BioTag, LENER_TAGS};
pub use viterbi::ViterbiDecoder;
