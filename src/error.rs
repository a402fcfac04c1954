//! Error taxonomy for the transcoding pipeline.
//!
//! Every failure surfaced to a caller carries the run id, the phase it
//! happened in and, when one rendition is to blame, the profile name. Nothing
//! is retried inside the pipeline; retry policy belongs to the caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::profile::CatalogError;
use crate::domain::run::RunId;

/// Rejections raised before any resource is allocated.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),
    #[error("source is not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("source file type `{0}` is not allowed")]
    DisallowedType(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Failures while allocating the run directory tree.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("source file {path} is unreadable: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("destination root {path} is not writable: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create run directory {path}: {source}")]
    CreateRunDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures reported by an encoder backend for a single rendition.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to spawn encoder `{bin}`: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: io::Error,
    },
    #[error("encoder exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("encode canceled")]
    Canceled,
    #[error("encoder i/o error: {0}")]
    Io(#[from] io::Error),
}

impl EncodeError {
    /// Spawn failures mean the encoder binary itself is unusable, which is
    /// fatal for the whole run rather than one rendition.
    pub fn is_spawn(&self) -> bool {
        matches!(self, EncodeError::Spawn { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, EncodeError::Canceled)
    }
}

/// Terminal error of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("run rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("run {run_id} failed during staging: {source}")]
    Staging {
        run_id: RunId,
        #[source]
        source: StagingError,
    },
    /// The encoder backend itself is unusable: it could not be spawned, or a
    /// rendition task died without reporting a result.
    #[error("run {run_id}: fatal encoder error: {source}")]
    Fatal {
        run_id: RunId,
        #[source]
        source: EncodeError,
    },
    #[error("run {run_id}: rendition `{profile}` failed: {source}")]
    RenditionEncode {
        run_id: RunId,
        profile: String,
        #[source]
        source: EncodeError,
    },
    #[error("run {run_id}: master manifest write failed: {source}")]
    ManifestWrite {
        run_id: RunId,
        #[source]
        source: io::Error,
    },
    #[error("run {run_id} canceled")]
    Canceled { run_id: RunId },
}

impl PipelineError {
    /// Phase of the state machine the run failed in.
    pub fn phase(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Staging { .. } => "staging",
            PipelineError::Fatal { .. }
            | PipelineError::RenditionEncode { .. }
            | PipelineError::Canceled { .. } => "encoding",
            PipelineError::ManifestWrite { .. } => "assembling",
        }
    }

    /// Name of the failing profile, when a single rendition is to blame.
    pub fn profile(&self) -> Option<&str> {
        match self {
            PipelineError::RenditionEncode { profile, .. } => Some(profile),
            _ => None,
        }
    }

    pub fn run_id(&self) -> Option<RunId> {
        match self {
            PipelineError::Validation(_) => None,
            PipelineError::Staging { run_id, .. }
            | PipelineError::Fatal { run_id, .. }
            | PipelineError::RenditionEncode { run_id, .. }
            | PipelineError::ManifestWrite { run_id, .. }
            | PipelineError::Canceled { run_id } => Some(*run_id),
        }
    }
}
