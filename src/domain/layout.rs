//! On-disk naming scheme for renditions, segments and playlists.
//!
//! Pure path arithmetic, no I/O. Given the run root and a profile name every
//! artifact of a rendition is discoverable, and segment names are ordinal so
//! a sub-playlist is enough to enumerate them.

use std::path::{Path, PathBuf};

/// Master playlist file name at the run root.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Sub-playlist file name inside each rendition directory.
pub const SUB_PLAYLIST: &str = "playlist.m3u8";

/// printf-style segment pattern handed to the encoder.
const SEGMENT_PATTERN: &str = "segment_%03d.ts";

pub fn rendition_dir(run_root: &Path, profile_name: &str) -> PathBuf {
    run_root.join(profile_name)
}

pub fn sub_playlist_path(run_root: &Path, profile_name: &str) -> PathBuf {
    rendition_dir(run_root, profile_name).join(SUB_PLAYLIST)
}

/// Sub-playlist path relative to the run root, as referenced from the master
/// playlist. Always uses forward slashes per the HLS wire contract.
pub fn sub_playlist_rel(profile_name: &str) -> String {
    format!("{profile_name}/{SUB_PLAYLIST}")
}

pub fn segment_file_name(index: usize) -> String {
    format!("segment_{index:03}.ts")
}

pub fn segment_path(run_root: &Path, profile_name: &str, index: usize) -> PathBuf {
    rendition_dir(run_root, profile_name).join(segment_file_name(index))
}

/// Segment filename pattern for the encoder's `-hls_segment_filename` flag.
pub fn segment_pattern(rendition_dir: &Path) -> PathBuf {
    rendition_dir.join(SEGMENT_PATTERN)
}

pub fn master_playlist_path(run_root: &Path) -> PathBuf {
    run_root.join(MASTER_PLAYLIST)
}
