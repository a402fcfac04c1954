//! Encode job runner: fans one run out to N concurrent rendition encodes.
//!
//! The batch is one unit of work. Every profile is a task in a `JoinSet`
//! gated by a global admission semaphore; the first failure cancels the
//! remaining encodes and no further outcomes are reported. The runner keeps
//! draining the set after a failure so every child process is reaped before
//! the event channel closes, which lets the orchestrator clean up without
//! racing a dying encoder.

use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::layout;
use crate::domain::profile::ProfileCatalog;
use crate::domain::run::{EncodeEvent, RunId};
use crate::error::EncodeError;
use crate::ports::encoder::{EncodeBackend, RenditionRequest};

pub struct EncodeJobRunner<E> {
    backend: Arc<E>,
    limiter: Arc<Semaphore>,
}

impl<E> EncodeJobRunner<E>
where
    E: EncodeBackend + 'static,
{
    pub fn new(backend: Arc<E>, limiter: Arc<Semaphore>) -> Self {
        Self { backend, limiter }
    }

    /// Start encoding every profile of the catalog for one run. Events
    /// arrive on the returned channel; the channel closing means the whole
    /// batch has been reaped.
    pub fn spawn(
        &self,
        run_id: RunId,
        source: std::path::PathBuf,
        run_root: std::path::PathBuf,
        catalog: &ProfileCatalog,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<EncodeEvent> {
        let (tx, rx) = mpsc::channel(catalog.len() + 2);
        let backend = Arc::clone(&self.backend);
        let limiter = Arc::clone(&self.limiter);
        let catalog = catalog.clone();

        tokio::spawn(async move {
            let _ = tx.send(EncodeEvent::Started).await;
            debug!(%run_id, profiles = catalog.len(), "encode batch started");

            let mut set: JoinSet<(String, Result<(), EncodeError>)> = JoinSet::new();
            for profile in catalog.iter().cloned() {
                let backend = Arc::clone(&backend);
                let limiter = Arc::clone(&limiter);
                let cancel = cancel.clone();
                let request = RenditionRequest {
                    source: source.clone(),
                    output_dir: layout::rendition_dir(&run_root, &profile.name),
                    profile,
                };

                set.spawn(async move {
                    let name = request.profile.name.clone();
                    // Admission: never more encoder processes host-wide than
                    // the limiter allows.
                    let permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return (name, Err(EncodeError::Canceled));
                        }
                        permit = limiter.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return (name, Err(EncodeError::Canceled)),
                        },
                    };

                    let result = backend.encode_rendition(request, cancel).await;
                    drop(permit);
                    (name, result)
                });
            }

            let mut failed = false;
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((profile, Ok(()))) => {
                        if !failed {
                            let _ = tx.send(EncodeEvent::RenditionCompleted { profile }).await;
                        }
                    }
                    Ok((profile, Err(cause))) => {
                        if !failed {
                            failed = true;
                            cancel.cancel();
                            let event = if cause.is_spawn() {
                                EncodeEvent::Fatal { cause }
                            } else {
                                EncodeEvent::RenditionFailed { profile, cause }
                            };
                            let _ = tx.send(event).await;
                        }
                    }
                    Err(join_err) => {
                        if !failed {
                            failed = true;
                            cancel.cancel();
                            let _ = tx
                                .send(EncodeEvent::Fatal {
                                    cause: EncodeError::Io(io::Error::new(
                                        io::ErrorKind::Other,
                                        join_err,
                                    )),
                                })
                                .await;
                        }
                    }
                }
            }

            if !failed {
                let _ = tx.send(EncodeEvent::AllCompleted).await;
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::encoder::MockEncodeBackend;
    use std::path::PathBuf;

    fn runner_with(mock: MockEncodeBackend, permits: usize) -> EncodeJobRunner<MockEncodeBackend> {
        EncodeJobRunner::new(Arc::new(mock), Arc::new(Semaphore::new(permits)))
    }

    async fn collect(mut rx: mpsc::Receiver<EncodeEvent>) -> Vec<EncodeEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn all_renditions_completing_emits_all_completed_last() {
        let mut mock = MockEncodeBackend::new();
        mock.expect_encode_rendition()
            .times(4)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let runner = runner_with(mock, 2);
        let rx = runner.spawn(
            RunId::new(),
            PathBuf::from("/in.mp4"),
            PathBuf::from("/out/run"),
            &ProfileCatalog::standard(),
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        assert!(matches!(events.first(), Some(EncodeEvent::Started)));
        assert!(matches!(events.last(), Some(EncodeEvent::AllCompleted)));
        let completed = events
            .iter()
            .filter(|e| matches!(e, EncodeEvent::RenditionCompleted { .. }))
            .count();
        assert_eq!(completed, 4);
    }

    #[tokio::test]
    async fn first_failure_wins_and_suppresses_all_completed() {
        let mut mock = MockEncodeBackend::new();
        mock.expect_encode_rendition().returning(|request, _| {
            Box::pin(async move {
                if request.profile.name == "480p" {
                    Err(EncodeError::Failed {
                        code: Some(1),
                        stderr: "no such filter".to_string(),
                    })
                } else {
                    Ok(())
                }
            })
        });

        let runner = runner_with(mock, 4);
        let rx = runner.spawn(
            RunId::new(),
            PathBuf::from("/in.mp4"),
            PathBuf::from("/out/run"),
            &ProfileCatalog::standard(),
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        let failures: Vec<&EncodeEvent> = events
            .iter()
            .filter(|e| matches!(e, EncodeEvent::RenditionFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(
            matches!(failures[0], EncodeEvent::RenditionFailed { profile, .. } if profile == "480p")
        );
        assert!(!events
            .iter()
            .any(|e| matches!(e, EncodeEvent::AllCompleted)));
    }

    #[tokio::test]
    async fn spawn_failure_is_fatal() {
        let mut mock = MockEncodeBackend::new();
        mock.expect_encode_rendition().returning(|_, _| {
            Box::pin(async {
                Err(EncodeError::Spawn {
                    bin: "ffmpeg".to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
                })
            })
        });

        let catalog = ProfileCatalog::new(vec![crate::domain::profile::QualityProfile::new(
            "360p", 640, 360, 800, 96, 10,
        )])
        .unwrap();
        let runner = runner_with(mock, 1);
        let rx = runner.spawn(
            RunId::new(),
            PathBuf::from("/in.mp4"),
            PathBuf::from("/out/run"),
            &catalog,
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        assert!(events.iter().any(|e| matches!(e, EncodeEvent::Fatal { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, EncodeEvent::AllCompleted)));
    }

    #[tokio::test]
    async fn pre_canceled_batch_reports_no_completions() {
        let mut mock = MockEncodeBackend::new();
        // The backend is never reached once the token has fired before
        // admission.
        mock.expect_encode_rendition().never();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let runner = runner_with(mock, 4);
        let rx = runner.spawn(
            RunId::new(),
            PathBuf::from("/in.mp4"),
            PathBuf::from("/out/run"),
            &ProfileCatalog::standard(),
            cancel,
        );
        let events = collect(rx).await;

        assert!(!events
            .iter()
            .any(|e| matches!(e, EncodeEvent::RenditionCompleted { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, EncodeEvent::AllCompleted)));
    }
}
