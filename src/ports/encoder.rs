use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::domain::profile::QualityProfile;
use crate::error::EncodeError;

/// Everything a backend needs to materialize one rendition.
#[derive(Debug, Clone)]
pub struct RenditionRequest {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub profile: QualityProfile,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EncodeBackend: Send + Sync {
    /// Encode one rendition into its output directory: the sub-playlist plus
    /// ordinally named segments. Must stop promptly and return
    /// `EncodeError::Canceled` when the token fires; any files already
    /// written are the orchestrator's to clean up.
    async fn encode_rendition(
        &self,
        request: RenditionRequest,
        cancel: CancellationToken,
    ) -> Result<(), EncodeError>;
}
