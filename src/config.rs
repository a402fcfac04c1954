//! Configuration for the transcoding pipeline host.

use std::env;
use std::path::PathBuf;

/// Pipeline configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Encoder binary to invoke (must be on PATH or an absolute path)
    pub ffmpeg_bin: String,
    /// Host-wide cap on simultaneously running encoder processes
    pub max_concurrent_encodes: usize,
    /// Destination root for finished rendition sets
    pub output_root: PathBuf,
    /// Optional JSON file overriding the standard quality-profile ladder
    pub profile_file: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            ffmpeg_bin: env::var("FFMPEG_BIN").unwrap_or_else(|_| String::from("ffmpeg")),
            max_concurrent_encodes: env::var("MAX_CONCURRENT_ENCODES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(4),
            output_root: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./")),
            profile_file: env::var("PROFILE_FILE").ok().map(PathBuf::from),
        }
    }
}
