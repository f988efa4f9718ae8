//! Error type shared across the recognition pipeline.
//!
//! Every failure the node reports to its host maps onto one of these kinds,
//! so callers can tell a bad payload from a dead engine without parsing
//! message strings.

use thiserror::Error;

/// Unified failure value returned by the recognition pipeline.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The image source could not be downloaded or read.
    #[error("image source unavailable: {0}")]
    SourceUnavailable(String),

    /// The input payload had a shape the normalizer does not understand.
    #[error("unsupported payload: {0}")]
    UnsupportedPayload(String),

    /// The engine build exposes no usable entry point for the operation.
    #[error("engine capability missing: {0}")]
    CapabilityMissing(String),

    /// Recognition did not complete within the configured timeout.
    #[error("recognition timed out after {ms} ms")]
    Timeout { ms: u64 },

    /// The underlying recognition call raised an error.
    #[error("engine failure: {0}")]
    EngineFailure(String),
}

impl OcrError {
    /// Whether a caller could reasonably retry the request.
    ///
    /// Timeouts and unreachable sources are transient; a payload the
    /// normalizer rejects or a capability the engine build lacks will fail
    /// the same way every time. The node itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OcrError::Timeout { .. } | OcrError::SourceUnavailable(_)
        )
    }
}
