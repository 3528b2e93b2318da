//! The analysis collaborator contract.

use thiserror::Error;

use mailroom_core::Enrichment;

/// Errors returned by an analysis collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The call exceeded its bounded timeout. Transient.
    #[error("analysis timed out")]
    Timeout,

    /// Network failure or a 5xx-equivalent from the service. Transient.
    #[error("analysis transport failure: {0}")]
    Transport(String),

    /// The collaborator rejected the input; retrying cannot help.
    #[error("analysis rejected: {0}")]
    Rejected(String),
}

impl AnalysisError {
    /// Permanent failures skip the retry budget entirely.
    pub fn is_permanent(&self) -> bool {
        matches!(self, AnalysisError::Rejected(_))
    }
}

/// AI text-analysis collaborator.
///
/// Implementations carry their own bounded per-call timeout; expiry surfaces
/// as [`AnalysisError::Timeout`]. Calls must be side-effect free from the
/// workflow's point of view, so at-least-once invocation is safe.
pub trait MailAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Enrichment, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rejection_is_permanent() {
        assert!(AnalysisError::Rejected("bad input".to_string()).is_permanent());
        assert!(!AnalysisError::Timeout.is_permanent());
        assert!(!AnalysisError::Transport("connection reset".to_string()).is_permanent());
    }
}
