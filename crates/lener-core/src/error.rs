use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while adapting, loading, training or evaluating.
#[derive(Debug, Error)]
pub enum LenerError {
    /// A user-supplied value (selector, percentage, split name) is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A training configuration names something the engine does not support.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required file or directory does not exist.
    #[error("not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A directory exists but holds nothing to work with.
    #[error("no input files in {}", path.display())]
    EmptyInput {
        /// The empty directory.
        path: PathBuf,
    },

    /// A data line could not be split into the expected columns.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        /// File containing the malformed line.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// An operation was called in a state that does not allow it.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The wrapped CRF or neural engine reported a failure.
    #[error("engine error: {0}")]
    Engine(String),
}

impl LenerError {
    /// Shorthand for a [`LenerError::NotFound`] on `path`.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Shorthand for a [`LenerError::Parse`] error.
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for LeNER operations.
pub type Result<T> = std::result::Result<T, LenerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LenerError::InvalidArgument("percentage 1.5 outside [0, 1]".into());
        assert_eq!(
            err.to_string(),
            "invalid argument: percentage 1.5 outside [0, 1]"
        );

        let err = LenerError::parse("train/doc.conll", 7, "expected 2 columns, found 3");
        assert_eq!(
            err.to_string(),
            "train/doc.conll:7: expected 2 columns, found 3"
        );

        let err = LenerError::not_found("lener/dev");
        assert!(err.to_string().contains("lener/dev"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LenerError>();
    }
}
