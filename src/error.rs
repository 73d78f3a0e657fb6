//! Error types for the ingest pipeline
//!
//! Every fatal condition surfaces as an [`IngestError`] carrying enough
//! context (byte offset or branch path) to locate the problem in the input.

use crate::pipeline::SinkWriteError;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that can occur while converting XML into documents
#[derive(Debug, Error)]
pub enum IngestError {
    /// The byte stream is not well-formed XML
    #[error("malformed XML at byte {offset}: {message}")]
    MalformedInput { message: String, offset: u64 },

    /// Reading the input failed
    #[error("I/O error at byte {offset}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        offset: u64,
    },

    /// A completed branch violated an internal invariant
    #[error("mapping error at '{path}': {message}")]
    Mapping { message: String, path: String },

    /// The repeat path occurs again rooted at the branch element
    #[error("repeating element nested inside itself at '{path}' (byte {offset})")]
    RecursiveBranch { path: String, offset: u64 },

    /// The sink rejected some or all documents of a batch
    #[error("batch {batch} (starting at document {first_document}) failed: {source}")]
    SinkWrite {
        batch: u64,
        first_document: u64,
        #[source]
        source: SinkWriteError,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Build a malformed-input error at an absolute byte offset
    pub fn malformed(message: impl Into<String>, offset: u64) -> Self {
        IngestError::MalformedInput {
            message: message.into(),
            offset,
        }
    }

    /// Byte offset associated with the error, when there is one
    pub fn offset(&self) -> Option<u64> {
        match self {
            IngestError::MalformedInput { offset, .. }
            | IngestError::Io { offset, .. }
            | IngestError::RecursiveBranch { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_includes_offset() {
        let err = IngestError::malformed("unterminated tag", 42);
        assert_eq!(err.to_string(), "malformed XML at byte 42: unterminated tag");
        assert_eq!(err.offset(), Some(42));
    }

    #[test]
    fn test_config_error_has_no_offset() {
        let err = IngestError::Config("batch_size must be positive".to_string());
        assert_eq!(err.offset(), None);
    }
}
