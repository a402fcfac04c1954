//! Pipeline orchestrator: the all-or-nothing state machine.
//!
//! `Pending → Staging → Encoding → Assembling → Succeeded`, with `Failed`
//! reachable from `Staging`, `Encoding` and `Assembling`. On entering
//! `Failed` the staging area removes the entire run directory (and the
//! uploaded source when the pipeline owns it), so a run either leaves a
//! complete rendition set behind or nothing at all.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::runner::EncodeJobRunner;
use crate::application::staging::StagingArea;
use crate::domain::layout;
use crate::domain::manifest;
use crate::domain::profile::ProfileCatalog;
use crate::domain::run::{
    EncodeEvent, RenditionJob, RenditionStatus, RunId, RunState, TranscodeOutcome,
};
use crate::error::{PipelineError, ValidationError};
use crate::ports::encoder::EncodeBackend;

/// Source container formats accepted for ingestion.
const ALLOWED_SOURCE_EXTENSIONS: &[&str] =
    &["avi", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "webm"];

/// One transcode request: a source file, where the rendition set should
/// land, and the profile ladder to produce.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    pub dest_root: PathBuf,
    pub catalog: ProfileCatalog,
    /// When true the uploaded source belongs to the pipeline and is deleted
    /// together with the run directory on failure.
    pub owns_source: bool,
}

/// Entry point for callers. One `Pipeline` serves many concurrent runs; the
/// admission limiter caps simultaneously running encoder processes across
/// all of them.
pub struct Pipeline<E> {
    backend: Arc<E>,
    limiter: Arc<Semaphore>,
}

impl<E> Pipeline<E>
where
    E: EncodeBackend + 'static,
{
    pub fn new(backend: E, max_concurrent_encodes: usize) -> Self {
        Self {
            backend: Arc::new(backend),
            limiter: Arc::new(Semaphore::new(max_concurrent_encodes.max(1))),
        }
    }

    /// Validate the request and launch a run on its own task. Validation
    /// failures reject the request before any directory is created.
    pub async fn start(&self, request: TranscodeRequest) -> Result<RunHandle, PipelineError> {
        validate_source(&request.source).await?;

        let run_id = RunId::new();
        let cancel = CancellationToken::new();
        let runner = EncodeJobRunner::new(Arc::clone(&self.backend), Arc::clone(&self.limiter));

        info!(%run_id, source = %request.source.display(), "pipeline run accepted");
        let task = tokio::spawn(run(run_id, request, runner, cancel.clone()));

        Ok(RunHandle {
            run_id,
            cancel,
            task,
        })
    }
}

async fn validate_source(source: &Path) -> Result<(), ValidationError> {
    let meta = tokio::fs::metadata(source)
        .await
        .map_err(|_| ValidationError::SourceMissing(source.to_path_buf()))?;
    if !meta.is_file() {
        return Err(ValidationError::NotAFile(source.to_path_buf()));
    }

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ALLOWED_SOURCE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::DisallowedType(extension));
    }
    Ok(())
}

/// Handle on an in-flight run. Cancelling terminates the run's encoder
/// processes and takes the failure cleanup path.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    cancel: CancellationToken,
    task: JoinHandle<Result<TranscodeOutcome, PipelineError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<TranscodeOutcome, PipelineError> {
        match self.task.await {
            Ok(result) => result,
            // The run task never aborts itself, so a join error is a panic.
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        }
    }
}

fn advance(run_id: RunId, state: &mut RunState, next: RunState) {
    debug!(%run_id, from = %state, to = %next, "state transition");
    *state = next;
}

async fn run<E>(
    run_id: RunId,
    request: TranscodeRequest,
    runner: EncodeJobRunner<E>,
    cancel: CancellationToken,
) -> Result<TranscodeOutcome, PipelineError>
where
    E: EncodeBackend + 'static,
{
    let mut state = RunState::Pending;

    advance(run_id, &mut state, RunState::Staging);
    let mut staging = match StagingArea::prepare(
        &request.dest_root,
        run_id,
        &request.catalog,
        &request.source,
        request.owns_source,
    )
    .await
    {
        Ok(staging) => staging,
        Err(source) => {
            advance(run_id, &mut state, RunState::Failed);
            return Err(PipelineError::Staging { run_id, source });
        }
    };

    let mut jobs: Vec<RenditionJob> = request
        .catalog
        .iter()
        .map(|profile| {
            RenditionJob::new(
                profile.clone(),
                layout::rendition_dir(staging.run_root(), &profile.name),
            )
        })
        .collect();

    advance(run_id, &mut state, RunState::Encoding);
    // The runner gets a child token: a rendition failure cancels the rest of
    // the batch without marking the caller's token, so only a real
    // caller-requested cancellation fires the check below.
    let mut events = runner.spawn(
        run_id,
        request.source.clone(),
        staging.run_root().to_path_buf(),
        &request.catalog,
        cancel.child_token(),
    );

    // The event channel closes once every rendition task has been reaped,
    // so after this loop nothing is still writing into the run directory.
    let mut failure: Option<PipelineError> = None;
    while let Some(event) = events.recv().await {
        match event {
            EncodeEvent::Started => debug!(%run_id, "encoding started"),
            EncodeEvent::RenditionCompleted { profile } => {
                info!(%run_id, %profile, "rendition completed");
                set_status(&mut jobs, &profile, RenditionStatus::Completed);
            }
            EncodeEvent::RenditionFailed { profile, cause } => {
                warn!(%run_id, %profile, %cause, "rendition failed");
                set_status(&mut jobs, &profile, RenditionStatus::Failed);
                if failure.is_none() {
                    failure = Some(PipelineError::RenditionEncode {
                        run_id,
                        profile,
                        source: cause,
                    });
                }
            }
            EncodeEvent::Fatal { cause } => {
                error!(%run_id, %cause, "encoder fatal error");
                if failure.is_none() {
                    failure = Some(PipelineError::Fatal { run_id, source: cause });
                }
            }
            EncodeEvent::AllCompleted => info!(%run_id, "all renditions completed"),
        }
    }

    // A caller-requested cancellation surfaces as canceled rendition
    // failures; report it as cancellation unless a real encode error was
    // recorded first, in which case the diagnostics win.
    if cancel.is_cancelled() {
        let real_failure = match &failure {
            None => false,
            Some(PipelineError::RenditionEncode { source, .. })
            | Some(PipelineError::Fatal { source, .. }) => !source.is_canceled(),
            Some(_) => true,
        };
        if !real_failure {
            failure = Some(PipelineError::Canceled { run_id });
        }
    }

    if let Some(err) = failure {
        advance(run_id, &mut state, RunState::Failed);
        staging.cleanup().await;
        error!(%run_id, phase = err.phase(), %err, "run failed, partial output removed");
        return Err(err);
    }

    advance(run_id, &mut state, RunState::Assembling);
    if let Err(source) = manifest::write_master(staging.run_root(), &request.catalog).await {
        advance(run_id, &mut state, RunState::Failed);
        staging.cleanup().await;
        let err = PipelineError::ManifestWrite { run_id, source };
        error!(%run_id, %err, "manifest write failed, run rolled back");
        return Err(err);
    }

    advance(run_id, &mut state, RunState::Succeeded);
    let run_root = staging.release();
    info!(%run_id, run_root = %run_root.display(), "run succeeded");

    Ok(TranscodeOutcome {
        run_id,
        manifest_path: PathBuf::from(run_id.to_string()).join(layout::MASTER_PLAYLIST),
        profiles: jobs.iter().map(|job| job.profile.name.clone()).collect(),
    })
}

fn set_status(jobs: &mut [RenditionJob], profile: &str, status: RenditionStatus) {
    if let Some(job) = jobs.iter_mut().find(|job| job.profile.name == profile) {
        job.status = status;
    }
}
