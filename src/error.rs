//! Error taxonomy for reconciliation and propagation.
//!
//! # Design Decisions
//! - Schema and layer errors are raised before any statement reaches the channel
//! - Apply errors carry the channel error that aborted the transaction
//! - Connectivity failures pass through with their original text

use thiserror::Error;

use crate::channel::ChannelError;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown object class, attribute, or an ill-typed value.
    #[error("schema error: {0}")]
    Schema(String),

    /// Criteria matched an unexpected number of records.
    #[error("{message}")]
    AmbiguousTarget { count: usize, message: String },

    /// The channel failed a statement mid-transaction; nothing was written.
    #[error("failed to {action} {table}: {source}")]
    Apply {
        action: &'static str,
        table: &'static str,
        #[source]
        source: ChannelError,
    },

    /// Propagation into CONFIG, or an unsupported layer/direction pair.
    #[error("invalid layer transition: {0}")]
    InvalidLayer(String),

    /// Channel failure outside a transaction.
    #[error(transparent)]
    Channel(ChannelError),
}

impl From<ChannelError> for Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Schema(message) => Self::Schema(message),
            other => Self::Channel(other),
        }
    }
}

impl Error {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn invalid_layer(message: impl Into<String>) -> Self {
        Self::InvalidLayer(message.into())
    }

    /// Ambiguity raised by a delete that would touch several records.
    pub fn ambiguous_delete(count: usize, noun: &str) -> Self {
        Self::AmbiguousTarget {
            count,
            message: format!(
                "Operation would delete {count} {noun}s; narrow the criteria or set force_multi_delete to delete them all"
            ),
        }
    }

    /// Ambiguity raised by an update whose criteria match several records.
    pub fn ambiguous_update(count: usize, noun: &str) -> Self {
        Self::AmbiguousTarget {
            count,
            message: format!(
                "Criteria match {count} {noun}s; an update must target exactly one, supply narrower criteria"
            ),
        }
    }

    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Schema(_) => "schema",
            Error::AmbiguousTarget { .. } => "ambiguous_target",
            Error::Apply { .. } => "apply",
            Error::InvalidLayer(_) => "invalid_layer",
            Error::Channel(_) => "channel",
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_delete_names_count() {
        let err = Error::ambiguous_delete(3, "rule");
        assert!(err.to_string().contains("3 rules"));
        assert!(err.to_string().contains("force_multi_delete"));
        assert_eq!(err.kind(), "ambiguous_target");
    }

    #[test]
    fn test_channel_error_passes_through() {
        let err: Error = ChannelError::Connection("Access denied for user 'admin'".into()).into();
        assert_eq!(err.to_string(), "Access denied for user 'admin'");
    }

    #[test]
    fn test_channel_schema_error_becomes_schema_error() {
        let err: Error = ChannelError::Schema("unknown attribute \"colour\"".into()).into();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(err.kind(), "schema");
    }
}
