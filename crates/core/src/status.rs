//! Display-state projection for polling clients.
//!
//! Collapses the five workflow states into the four things a client can
//! usefully show, with an actionability flag driving which ones get buttons.

use serde::{Deserialize, Serialize};

use crate::package::PackageState;

/// Client-facing display state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    /// Scanning or Processing: background work pending, nothing to do.
    Processing,
    /// Enrichment done; the survey action is available.
    ReadyForSurvey,
    /// Terminal, non-actionable.
    Completed,
    /// Enrichment failed; the retry action is available.
    NeedsAttention,
}

impl DisplayState {
    pub fn label(self) -> &'static str {
        match self {
            DisplayState::Processing => "Processing…",
            DisplayState::ReadyForSurvey => "Ready for Survey",
            DisplayState::Completed => "Completed",
            DisplayState::NeedsAttention => "Needs Attention",
        }
    }

    /// Whether the client should offer an action (survey or retry).
    pub fn is_actionable(self) -> bool {
        matches!(self, DisplayState::ReadyForSurvey | DisplayState::NeedsAttention)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DisplayState::Completed)
    }
}

impl From<PackageState> for DisplayState {
    fn from(state: PackageState) -> Self {
        match state {
            PackageState::Scanning | PackageState::Processing => DisplayState::Processing,
            PackageState::ReadyForSurvey => DisplayState::ReadyForSurvey,
            PackageState::SurveyComplete => DisplayState::Completed,
            PackageState::Failed => DisplayState::NeedsAttention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_state() {
        assert_eq!(
            DisplayState::from(PackageState::Scanning),
            DisplayState::Processing
        );
        assert_eq!(
            DisplayState::from(PackageState::Processing),
            DisplayState::Processing
        );
        assert_eq!(
            DisplayState::from(PackageState::ReadyForSurvey),
            DisplayState::ReadyForSurvey
        );
        assert_eq!(
            DisplayState::from(PackageState::SurveyComplete),
            DisplayState::Completed
        );
        assert_eq!(
            DisplayState::from(PackageState::Failed),
            DisplayState::NeedsAttention
        );
    }

    #[test]
    fn actionability() {
        assert!(DisplayState::ReadyForSurvey.is_actionable());
        assert!(DisplayState::NeedsAttention.is_actionable());
        assert!(!DisplayState::Processing.is_actionable());
        assert!(!DisplayState::Completed.is_actionable());
        assert!(DisplayState::Completed.is_terminal());
    }
}
