//! Error types for quire operator list construction.

use thiserror::Error;

/// Primary error type for operator list production.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("worker task was terminated: {task}")]
    Terminated { task: String },

    #[error("worker was terminated")]
    DocumentTerminated,

    #[error("operator list has no stream sink to flush into")]
    MissingSink,

    #[error("evaluator error: {0}")]
    Evaluator(String),

    #[error("invalid pattern limits: {0}")]
    InvalidLimits(String),
}

impl RenderError {
    /// True for the cooperative cancellation conditions.
    ///
    /// These are not failures of the content itself; the producer stops and
    /// finishes its task without reporting anything to the requester.
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. } | Self::DocumentTerminated)
    }
}

/// Convenience Result type alias for RenderError.
pub type Result<T> = std::result::Result<T, RenderError>;
