use thiserror::Error;

use crate::sink::InsertError;

// ============================================================================
// Decoder Errors
// ============================================================================

/// Errors raised while decoding a schema, a log header or a snapshot.
/// They end the current decode only.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Malformed schema text or log header
    #[error("format error: {0}")]
    Format(String),

    /// A field window falls outside the bytes it is read from
    #[error("field {field}: window [{offset}, {end}) outside {available} available bytes")]
    Bounds {
        field: String,
        offset: usize,
        end: usize,
        available: usize,
    },

    /// Snapshot index outside `0..count`
    #[error("snapshot index {index} out of range, log holds {count} snapshots")]
    Index { index: usize, count: usize },
}

impl DecodeError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        DecodeError::Format(msg.into())
    }
}

/// Continuity problem between two consecutive snapshots.
///
/// Advisory: callers log and count it, then keep using the log.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("snapshot {index}: sequence counter went backwards ({previous} -> {current})")]
pub struct ValidationWarning {
    pub index: usize,
    pub previous: u32,
    pub current: u32,
}

// ============================================================================
// Correlator Errors
// ============================================================================

/// Failures scoped to a single file or row inside a task
#[derive(Debug, Error)]
pub enum ParseError {
    /// File suffix the correlator cannot route
    #[error("unknown test suffix: {0}")]
    UnknownSuffix(String),

    /// Data file payload above the configured cap
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    SizeLimit { size: usize, limit: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("insert failed: {0}")]
    Insert(#[from] InsertError),
}
