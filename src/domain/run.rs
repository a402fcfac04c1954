//! Pipeline run state: identifiers, state machine, rendition jobs and the
//! event stream produced by the encode job runner.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::profile::QualityProfile;
use crate::error::EncodeError;

/// Unique identifier of one pipeline run. Also names the run directory, so
/// it is always generated, never derived from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// States of the orchestrator's state machine. `Failed` is reachable from
/// `Staging`, `Encoding` and `Assembling`; `Succeeded` only from `Assembling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Staging,
    Encoding,
    Assembling,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Pending => "pending",
            RunState::Staging => "staging",
            RunState::Encoding => "encoding",
            RunState::Assembling => "assembling",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionStatus {
    Pending,
    Completed,
    Failed,
}

/// One quality profile's encode within a run. Never outlives its run.
#[derive(Debug, Clone)]
pub struct RenditionJob {
    pub profile: QualityProfile,
    pub output_dir: PathBuf,
    pub status: RenditionStatus,
}

impl RenditionJob {
    pub fn new(profile: QualityProfile, output_dir: PathBuf) -> Self {
        Self {
            profile,
            output_dir,
            status: RenditionStatus::Pending,
        }
    }
}

/// Discrete events emitted by the encode job runner while a run's rendition
/// batch is in flight.
#[derive(Debug)]
pub enum EncodeEvent {
    Started,
    RenditionCompleted {
        profile: String,
    },
    RenditionFailed {
        profile: String,
        cause: EncodeError,
    },
    AllCompleted,
    /// The encoder itself is unusable (spawn failure or a panicked task).
    Fatal {
        cause: EncodeError,
    },
}

/// Successful result handed to the caller. `manifest_path` is relative to
/// the destination root, suitable for storing as the playable URL.
#[derive(Debug, Clone, Serialize)]
pub struct TranscodeOutcome {
    pub run_id: RunId,
    pub manifest_path: PathBuf,
    pub profiles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        for state in [
            RunState::Pending,
            RunState::Staging,
            RunState::Encoding,
            RunState::Assembling,
        ] {
            assert!(!state.is_terminal());
        }
    }
}
