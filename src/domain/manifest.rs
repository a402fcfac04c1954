//! Master manifest assembly.
//!
//! The master playlist is rebuilt in full on every successful run and written
//! atomically (temp name, then rename) so a reader can never observe a
//! half-written manifest. It lists one `EXT-X-STREAM-INF` entry per profile
//! in the catalog's ascending-bitrate order.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::domain::layout;
use crate::domain::profile::ProfileCatalog;

/// Render the master playlist text for a completed rendition set.
pub fn render_master(catalog: &ProfileCatalog) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for profile in catalog.iter() {
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n",
            profile.bandwidth(),
            profile.resolution()
        ));
        out.push_str(&layout::sub_playlist_rel(&profile.name));
        out.push('\n');
    }
    out
}

/// Write the master playlist under the run root and atomically rename it
/// into place. Returns the final path.
pub async fn write_master(run_root: &Path, catalog: &ProfileCatalog) -> io::Result<PathBuf> {
    let final_path = layout::master_playlist_path(run_root);
    let tmp_path = run_root.join(format!(".{}.tmp", layout::MASTER_PLAYLIST));

    let mut file = File::create(&tmp_path).await?;
    file.write_all(render_master(catalog).as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, &final_path).await?;
    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn master_lists_profiles_in_ascending_bandwidth_order() {
        let text = render_master(&ProfileCatalog::standard());
        assert_eq!(
            text,
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
             360p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=854x480\n\
             480p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n\
             720p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080\n\
             1080p/playlist.m3u8\n"
        );
    }

    #[tokio::test]
    async fn write_master_leaves_no_temp_file_behind() {
        let tmp = TempDir::new().unwrap();
        let catalog = ProfileCatalog::standard();

        let path = write_master(tmp.path(), &catalog).await.unwrap();
        assert_eq!(path, tmp.path().join(layout::MASTER_PLAYLIST));

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, render_master(&catalog));

        let entries: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![layout::MASTER_PLAYLIST.to_string()]);
    }

    #[tokio::test]
    async fn write_master_fails_when_run_root_is_missing() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone");
        assert!(write_master(&missing, &ProfileCatalog::standard())
            .await
            .is_err());
    }
}
