/// Artifact status definitions for tracking archive progress
///
/// The status of a (date, kind) pair is never stored on its own. At the start
/// of a run it is derived from the archive (a well-formed file means
/// `Complete`, anything else means `Missing`), and during a run the stage
/// orchestrator moves it through the remaining states.
use std::fmt;

/// Represents the current state of one artifact for one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactStatus {
    /// No well-formed artifact exists yet
    Missing,

    /// A stage is currently producing the artifact
    InProgress,

    /// The artifact has been committed to the archive
    Complete,

    /// Production failed after retries were exhausted (or on a fatal error)
    Failed,
}

impl ArtifactStatus {
    /// Returns true if no further work will happen for this artifact in the current attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Returns true if downstream kinds may rely on this artifact
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns true if moving from `self` to `next` is a legal lifecycle step
    ///
    /// `Failed -> Missing` is how a day-level retry (or a later run) gives an
    /// artifact another chance.
    pub fn can_transition_to(&self, next: ArtifactStatus) -> bool {
        matches!(
            (self, next),
            (Self::Missing, Self::InProgress)
                | (Self::InProgress, Self::Complete)
                | (Self::InProgress, Self::Failed)
                | (Self::InProgress, Self::Missing)
                | (Self::Failed, Self::Missing)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
