//! Provider framework error types
//!
//! Error definitions with transient/permanent classification so the engine
//! can decide between pruning a source for this sync and removing it.

use thiserror::Error;

/// Error that can occur while talking to an external content source.
#[derive(Debug, Error)]
pub enum ProviderError {
    // Reachability errors (transient; the source is pruned for this sync)
    /// The source exists but could not be reached or read.
    #[error("source unreachable: {source_id}: {message}")]
    Unreachable {
        source_id: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The source responded with data the adapter could not interpret.
    #[error("source malformed: {source_id}: {message}")]
    Malformed { source_id: String, message: String },

    // Permanent errors
    /// The source no longer exists at the provider.
    #[error("source gone: {source_id}")]
    SourceGone { source_id: String },

    /// No adapter is registered for the requested source kind.
    #[error("unsupported source kind: {kind}")]
    UnsupportedKind { kind: String },
}

impl ProviderError {
    /// Create an `Unreachable` error without an underlying cause.
    pub fn unreachable(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            source_id: source_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Malformed` error.
    pub fn malformed(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a `SourceGone` error.
    pub fn gone(source_id: impl Into<String>) -> Self {
        Self::SourceGone {
            source_id: source_id.into(),
        }
    }

    /// Whether retrying on a later sync could plausibly succeed.
    ///
    /// Transient failures prune the source from the current working set;
    /// permanent ones let the engine drop the record entirely.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Unreachable { .. } | ProviderError::Malformed { .. }
        )
    }
}

/// Convenience result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
