//! Error types for moshforged-riff.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::riff::FourCc;

/// Result type for moshforged-riff operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for moshforged-riff operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// I/O error tied to a specific file.
    #[error("I/O error on {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The first 12 bytes are not a supported RIFF header.
    #[error("Invalid RIFF header: {0}")]
    InvalidHeader(String),

    /// Input ends before a required structure is complete.
    #[error("Truncated input: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// A rewritten list no longer fits a 32-bit size field.
    #[error("LIST '{list_type}' would grow to {size} bytes")]
    ListTooLarge { list_type: FourCc, size: u64 },
}

impl Error {
    /// Create an invalid header error.
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    /// Attach a path to an I/O error.
    pub fn file(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error comes from the container format rather than I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader(_) | Self::Truncated { .. } | Self::ListTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_header("expected RIFF");
        assert_eq!(err.to_string(), "Invalid RIFF header: expected RIFF");

        let err = Error::Truncated { need: 12, have: 3 };
        assert_eq!(err.to_string(), "Truncated input: need 12 bytes, have 3");

        let err = Error::ListTooLarge {
            list_type: FourCc::MOVI,
            size: 1 << 32,
        };
        assert_eq!(err.to_string(), "LIST 'movi' would grow to 4294967296 bytes");
        assert!(err.is_format_error());
    }

    #[test]
    fn test_file_error_keeps_path() {
        let err = Error::file(
            "/tmp/in.avi",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/tmp/in.avi"));
        assert!(!err.is_format_error());
    }
}
