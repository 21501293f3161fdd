//! Bridge error taxonomy
//!
//! Errors raised by the execution bridge itself. Failures produced by the
//! scheduled operation never pass through this type; they reach the caller
//! unchanged.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The host did not report readiness within the startup bound.
    #[error("execution host failed to start: {0}")]
    Startup(String),

    /// The caller's wait exceeded its timeout.
    #[error("operation timed out after {elapsed:?} (cancelled: {cancelled})")]
    Timeout { elapsed: Duration, cancelled: bool },

    /// Invalid bridge parameters, rejected before scheduling.
    #[error("bridge configuration error: {0}")]
    Configuration(String),

    /// The host thread terminated without being asked to.
    #[error("execution host crashed: {0}")]
    HostCrashed(String),

    /// The host dropped the operation before it produced an outcome.
    #[error("execution host dropped the operation: {0}")]
    HostUnavailable(String),

    #[error("operation panicked: {0}")]
    OperationPanicked(String),

    #[error("bridge is closed")]
    Closed,
}

impl BridgeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout { .. })
    }
}
