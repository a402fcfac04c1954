//! Crooner - HLS ingestion and adaptive-bitrate transcoding pipeline
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (quality profiles, segment layout, manifests, run state)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (ffmpeg subprocess backend)
//! - application/: Services (staging, encode job runner, pipeline orchestrator)
//! - config: Environment configuration
//!
//! A pipeline run takes one uploaded source file and materializes a complete
//! HLS rendition set (one sub-playlist plus segments per quality profile and
//! a master playlist) under a run-private directory, or rolls everything back
//! on the first failure. Nothing in between is ever left on disk.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

// Re-exports for convenience
pub use adapters::ffmpeg::FfmpegEncoder;
pub use application::orchestrator::{Pipeline, RunHandle, TranscodeRequest};
pub use config::PipelineConfig;
pub use domain::profile::{ProfileCatalog, QualityProfile};
pub use domain::run::{RunId, RunState, TranscodeOutcome};
pub use error::PipelineError;
