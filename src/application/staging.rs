//! Staging area manager: run-scoped working directories.
//!
//! Each run gets a private directory tree named after its run id, with one
//! subdirectory per quality profile. Exactly one of `cleanup` (failure) or
//! `release` (success, ownership transfers to the caller) ends the staging
//! area's life; `cleanup` is idempotent and best-effort.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::domain::layout;
use crate::domain::profile::ProfileCatalog;
use crate::domain::run::RunId;
use crate::error::StagingError;

pub struct StagingArea {
    run_root: PathBuf,
    source: PathBuf,
    owns_source: bool,
    released: bool,
}

impl StagingArea {
    /// Allocate the run directory tree under `dest_root`. The run id makes
    /// the name collision-free, so an already-existing run directory is a
    /// hard error, not something to reuse.
    pub async fn prepare(
        dest_root: &Path,
        run_id: RunId,
        catalog: &ProfileCatalog,
        source: &Path,
        owns_source: bool,
    ) -> Result<Self, StagingError> {
        fs::metadata(source)
            .await
            .map_err(|source_err| StagingError::SourceUnreadable {
                path: source.to_path_buf(),
                source: source_err,
            })?;

        fs::create_dir_all(dest_root)
            .await
            .map_err(|source_err| StagingError::DestinationUnwritable {
                path: dest_root.to_path_buf(),
                source: source_err,
            })?;

        let run_root = dest_root.join(run_id.to_string());
        fs::create_dir(&run_root)
            .await
            .map_err(|source_err| StagingError::CreateRunDir {
                path: run_root.clone(),
                source: source_err,
            })?;

        for profile in catalog.iter() {
            let dir = layout::rendition_dir(&run_root, &profile.name);
            if let Err(source_err) = fs::create_dir(&dir).await {
                // Do not leave a half-built tree behind.
                let _ = fs::remove_dir_all(&run_root).await;
                return Err(StagingError::CreateRunDir {
                    path: dir,
                    source: source_err,
                });
            }
        }

        debug!(%run_id, run_root = %run_root.display(), "staging area prepared");
        Ok(Self {
            run_root,
            source: source.to_path_buf(),
            owns_source,
            released: false,
        })
    }

    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    /// Remove the whole run directory and, when the pipeline owns the
    /// uploaded source, the source file too. Safe to call more than once.
    pub async fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match fs::remove_dir_all(&self.run_root).await {
            Ok(()) => debug!(run_root = %self.run_root.display(), "run directory removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(run_root = %self.run_root.display(), %err, "failed to remove run directory")
            }
        }

        if self.owns_source {
            match fs::remove_file(&self.source).await {
                Ok(()) => debug!(source = %self.source.display(), "temp upload removed"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(source = %self.source.display(), %err, "failed to remove temp upload")
                }
            }
        }
    }

    /// Hand the finished output directory over to the caller. After this the
    /// staging area no longer touches anything on disk.
    pub fn release(mut self) -> PathBuf {
        self.released = true;
        self.run_root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn touch(path: &Path) {
        fs::write(path, b"raw video").await.unwrap();
    }

    #[tokio::test]
    async fn prepare_creates_one_directory_per_profile() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("upload.mp4");
        touch(&source).await;
        let dest = tmp.path().join("streams");

        let catalog = ProfileCatalog::standard();
        let staging = StagingArea::prepare(&dest, RunId::new(), &catalog, &source, false)
            .await
            .unwrap();

        for profile in catalog.iter() {
            assert!(layout::rendition_dir(staging.run_root(), &profile.name).is_dir());
        }
    }

    #[tokio::test]
    async fn missing_source_fails_without_creating_directories() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("streams");

        let result = StagingArea::prepare(
            &dest,
            RunId::new(),
            &ProfileCatalog::standard(),
            &tmp.path().join("nope.mp4"),
            false,
        )
        .await;

        assert!(matches!(result, Err(StagingError::SourceUnreadable { .. })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("upload.mp4");
        touch(&source).await;

        let mut staging = StagingArea::prepare(
            tmp.path(),
            RunId::new(),
            &ProfileCatalog::standard(),
            &source,
            false,
        )
        .await
        .unwrap();
        let run_root = staging.run_root().to_path_buf();

        staging.cleanup().await;
        assert!(!run_root.exists());
        // Second invocation is a no-op, not an error.
        staging.cleanup().await;
        assert!(source.exists());
    }

    #[tokio::test]
    async fn cleanup_removes_owned_source() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("upload.mp4");
        touch(&source).await;

        let mut staging = StagingArea::prepare(
            tmp.path(),
            RunId::new(),
            &ProfileCatalog::standard(),
            &source,
            true,
        )
        .await
        .unwrap();

        staging.cleanup().await;
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn release_keeps_everything_on_disk() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("upload.mp4");
        touch(&source).await;

        let staging = StagingArea::prepare(
            tmp.path(),
            RunId::new(),
            &ProfileCatalog::standard(),
            &source,
            true,
        )
        .await
        .unwrap();

        let run_root = staging.release();
        assert!(run_root.is_dir());
        assert!(source.exists());
    }
}
