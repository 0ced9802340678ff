//! Error taxonomy for the merge-join pipeline
//!
//! Every failure is fatal for the run; nothing here is retried.

use std::path::Path;

use thiserror::Error;

/// Errors raised by shard reading, merging, joining and the channel
#[derive(Debug, Error)]
pub enum SwapError {
    /// Bad run configuration (unknown party, missing paths, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// File open/read/write failure
    #[error("I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A row that is neither blank nor `privateId,userId`
    #[error("malformed row in {origin} at line {line}: {row:?} (expected exactly one ',')")]
    MalformedRow { origin: String, line: u64, row: String },

    /// A single record that cannot fit in an empty chunk
    #[error("record of {len} bytes does not fit in a {chunk_size}-byte chunk")]
    RecordTooLarge { len: usize, chunk_size: usize },

    /// Received chunk payload is not valid record text
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    /// Channel send/receive/connect failure
    #[error("transport error on {label}: {source}")]
    Transport {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

impl SwapError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        SwapError::Io {
            context: path.display().to_string(),
            source,
        }
    }

    pub fn transport(label: &str, source: std::io::Error) -> Self {
        SwapError::Transport {
            label: label.to_string(),
            source,
        }
    }

    /// True for errors raised before any file or socket was touched
    pub fn is_configuration(&self) -> bool {
        matches!(self, SwapError::Configuration(_))
    }
}

pub type Result<T, E = SwapError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_source() {
        let err = SwapError::MalformedRow {
            origin: "shard_3".to_string(),
            line: 17,
            row: "a,b,c".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("shard_3"));
        assert!(msg.contains("17"));

        let err = SwapError::io(
            Path::new("/tmp/out.csv"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/out.csv"));
        assert!(!err.is_configuration());
        assert!(SwapError::Configuration("x".into()).is_configuration());
    }
}
