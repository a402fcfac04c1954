//! ffmpeg-backed encoder: one subprocess invocation per rendition.
//!
//! The keyframe interval is forced to the profile's segment duration so
//! segment boundaries align with keyframes, and the playlist is marked VOD.
//! The child is spawned with `kill_on_drop` and killed explicitly on
//! cancellation so no orphan encoder survives a dropped run.

use std::ffi::OsString;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::layout;
use crate::error::EncodeError;
use crate::ports::encoder::{EncodeBackend, RenditionRequest};

pub struct FfmpegEncoder {
    bin: String,
}

impl FfmpegEncoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Argument list for one rendition encode, kept separate from process
/// handling so the mapping from profile to encoder flags is testable.
fn hls_args(request: &RenditionRequest) -> Vec<OsString> {
    let profile = &request.profile;
    let seg = profile.segment_seconds;

    let scale = format!("scale={}:{}", profile.width, profile.height);
    let video_bitrate = format!("{}k", profile.video_bitrate_kbps);
    let bufsize = format!("{}k", profile.video_bitrate_kbps * 2);
    let audio_bitrate = format!("{}k", profile.audio_bitrate_kbps);
    let keyframes = format!("expr:gte(t,n_forced*{seg})");
    let hls_time = seg.to_string();

    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(request.source.clone().into_os_string());

    let flags = [
        "-vf",
        scale.as_str(),
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-profile:v",
        "main",
        "-pix_fmt",
        "yuv420p",
        "-b:v",
        video_bitrate.as_str(),
        "-maxrate",
        video_bitrate.as_str(),
        "-bufsize",
        bufsize.as_str(),
        "-c:a",
        "aac",
        "-b:a",
        audio_bitrate.as_str(),
        "-ac",
        "2",
        // Keyframes on segment boundaries, no scene-cut extras.
        "-force_key_frames",
        keyframes.as_str(),
        "-sc_threshold",
        "0",
        "-hls_time",
        hls_time.as_str(),
        "-hls_playlist_type",
        "vod",
        "-hls_list_size",
        "0",
        "-hls_segment_type",
        "mpegts",
        "-start_number",
        "0",
        "-hls_segment_filename",
    ];
    args.extend(flags.into_iter().map(OsString::from));

    args.push(layout::segment_pattern(&request.output_dir).into_os_string());
    args.push(
        request
            .output_dir
            .join(layout::SUB_PLAYLIST)
            .into_os_string(),
    );

    args
}

#[async_trait]
impl EncodeBackend for FfmpegEncoder {
    async fn encode_rendition(
        &self,
        request: RenditionRequest,
        cancel: CancellationToken,
    ) -> Result<(), EncodeError> {
        let profile = request.profile.name.clone();
        debug!(%profile, bin = %self.bin, "spawning encoder");

        let mut child = Command::new(&self.bin)
            .args(hls_args(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncodeError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        // Drain stderr concurrently so a chatty encoder cannot block on a
        // full pipe.
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                let stderr = stderr_task.await.unwrap_or_default();
                if status.success() {
                    debug!(%profile, "encoder finished");
                    Ok(())
                } else {
                    warn!(%profile, code = ?status.code(), "encoder failed");
                    Err(EncodeError::Failed {
                        code: status.code(),
                        stderr: stderr.trim().to_string(),
                    })
                }
            }
            _ = cancel.cancelled() => {
                warn!(%profile, "encode canceled, killing encoder process");
                let _ = child.start_kill();
                let _ = child.wait().await;
                stderr_task.abort();
                Err(EncodeError::Canceled)
            }
        }
    }
}
