//! Quality profiles: the static catalog of target renditions.
//!
//! A catalog is validated once at startup and never re-parsed per run. The
//! ascending-bitrate ordering is relied upon when the master playlist is
//! assembled, so it is enforced here rather than at the call site.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One target rendition: resolution, bitrate caps and segmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    /// Segment duration in seconds, also used as the keyframe interval so
    /// segment boundaries land on keyframes.
    pub segment_seconds: u32,
}

impl QualityProfile {
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        video_bitrate_kbps: u32,
        audio_bitrate_kbps: u32,
        segment_seconds: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            video_bitrate_kbps,
            audio_bitrate_kbps,
            segment_seconds,
        }
    }

    /// Resolution attribute as it appears in the master playlist.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// BANDWIDTH attribute in bits per second, derived from the video bitrate.
    pub fn bandwidth(&self) -> u64 {
        self.video_bitrate_kbps as u64 * 1000
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("profile catalog is empty")]
    Empty,
    #[error("profiles must be in strictly ascending video bitrate order: `{0}` breaks the order")]
    NotAscending(String),
    #[error("duplicate profile name `{0}`")]
    DuplicateName(String),
    #[error("profile `{0}` has a zero segment duration")]
    ZeroSegmentDuration(String),
}

/// Ordered, validated set of quality profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<QualityProfile>", into = "Vec<QualityProfile>")]
pub struct ProfileCatalog {
    profiles: Vec<QualityProfile>,
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<QualityProfile>) -> Result<Self, CatalogError> {
        if profiles.is_empty() {
            return Err(CatalogError::Empty);
        }
        for pair in profiles.windows(2) {
            if pair[1].video_bitrate_kbps <= pair[0].video_bitrate_kbps {
                return Err(CatalogError::NotAscending(pair[1].name.clone()));
            }
        }
        for (i, profile) in profiles.iter().enumerate() {
            if profile.segment_seconds == 0 {
                return Err(CatalogError::ZeroSegmentDuration(profile.name.clone()));
            }
            if profiles[..i].iter().any(|p| p.name == profile.name) {
                return Err(CatalogError::DuplicateName(profile.name.clone()));
            }
        }
        Ok(Self { profiles })
    }

    /// The standard ladder used when no catalog override is configured.
    pub fn standard() -> Self {
        Self {
            profiles: vec![
                QualityProfile::new("360p", 640, 360, 800, 96, 10),
                QualityProfile::new("480p", 854, 480, 1400, 128, 10),
                QualityProfile::new("720p", 1280, 720, 2800, 128, 10),
                QualityProfile::new("1080p", 1920, 1080, 5000, 192, 10),
            ],
        }
    }

    /// Parse and validate a catalog from a JSON array of profiles.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QualityProfile> {
        self.profiles.iter()
    }

    // A catalog is never empty by construction, so no `is_empty` here.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }
}

impl TryFrom<Vec<QualityProfile>> for ProfileCatalog {
    type Error = CatalogError;

    fn try_from(profiles: Vec<QualityProfile>) -> Result<Self, Self::Error> {
        Self::new(profiles)
    }
}

impl From<ProfileCatalog> for Vec<QualityProfile> {
    fn from(catalog: ProfileCatalog) -> Self {
        catalog.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_valid_and_ascending() {
        let catalog = ProfileCatalog::standard();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.names(), vec!["360p", "480p", "720p", "1080p"]);
        let bandwidths: Vec<u64> = catalog.iter().map(|p| p.bandwidth()).collect();
        assert_eq!(bandwidths, vec![800_000, 1_400_000, 2_800_000, 5_000_000]);
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert_eq!(ProfileCatalog::new(vec![]), Err(CatalogError::Empty));
    }

    #[test]
    fn non_ascending_bitrates_are_rejected() {
        let result = ProfileCatalog::new(vec![
            QualityProfile::new("720p", 1280, 720, 2800, 128, 10),
            QualityProfile::new("360p", 640, 360, 800, 96, 10),
        ]);
        assert_eq!(result, Err(CatalogError::NotAscending("360p".to_string())));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = ProfileCatalog::new(vec![
            QualityProfile::new("hd", 1280, 720, 2800, 128, 10),
            QualityProfile::new("hd", 1920, 1080, 5000, 192, 10),
        ]);
        assert_eq!(result, Err(CatalogError::DuplicateName("hd".to_string())));
    }

    #[test]
    fn zero_segment_duration_is_rejected() {
        let result = ProfileCatalog::new(vec![QualityProfile::new("360p", 640, 360, 800, 96, 0)]);
        assert_eq!(
            result,
            Err(CatalogError::ZeroSegmentDuration("360p".to_string()))
        );
    }

    #[test]
    fn catalog_round_trips_through_json_with_validation() {
        let json = serde_json::to_string(&ProfileCatalog::standard()).unwrap();
        let parsed = ProfileCatalog::from_json(&json).unwrap();
        assert_eq!(parsed.names(), ProfileCatalog::standard().names());

        // A descending ladder must fail at deserialization time.
        let bad = r#"[
            {"name":"720p","width":1280,"height":720,"video_bitrate_kbps":2800,"audio_bitrate_kbps":128,"segment_seconds":10},
            {"name":"360p","width":640,"height":360,"video_bitrate_kbps":800,"audio_bitrate_kbps":96,"segment_seconds":10}
        ]"#;
        assert!(ProfileCatalog::from_json(bad).is_err());
    }
}
