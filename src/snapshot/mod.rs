//! Snapshot encoding and storage
//!
//! A raw PNG capture from the browser is resized, re-encoded in the
//! configured format, and written to a [`SnapshotStore`]. The result is a
//! [`SnapshotRef`] that the inventory keeps in place of the pixels.

mod encode;
mod store;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use encode::{encode_snapshot, EncodedSnapshot};
pub use store::{FsSnapshotStore, MemorySnapshotStore, SnapshotStore};

/// Maximum length of the route slug in artifact names
const MAX_SLUG_LEN: usize = 80;

/// Snapshot failures; recorded on the screen, never fatal to the crawl
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("failed to decode capture: {0}")]
    Decode(String),

    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("failed to store snapshot: {0}")]
    Write(String),
}

/// Output image format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Format, quality and size limit for stored snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSettings {
    pub format: SnapshotFormat,

    /// JPEG quality, 1-100
    pub quality: u8,

    /// Wider captures are scaled down to this width before encoding
    pub max_width: u32,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            format: SnapshotFormat::Png,
            quality: 85,
            max_width: 1280,
        }
    }
}

/// Address and metadata of a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    /// Artifact name in the store
    pub id: String,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,

    /// Hex SHA-256 of the encoded artifact
    pub sha256: String,
}

impl SnapshotRef {
    /// Reads the artifact back as a base64 `data:` URI
    pub fn data_uri(&self, store: &dyn SnapshotStore) -> Result<String, SnapshotError> {
        let bytes = store.get(&self.id)?;
        Ok(format!("data:{};base64,{}", self.media_type, STANDARD.encode(bytes)))
    }
}

/// Builds the artifact name `screen-{slug}-{hash8}.{ext}`
///
/// # Examples
///
/// ```
/// use screen_atlas::snapshot::artifact_name;
///
/// assert_eq!(
///     artifact_name("/app#/settings", "0123456789abcdef", "png"),
///     "screen-app-settings-01234567.png"
/// );
/// assert_eq!(artifact_name("/", "deadbeefcafe", "jpg"), "screen-home-deadbeef.jpg");
/// ```
pub fn artifact_name(route: &str, sha256_hex: &str, extension: &str) -> String {
    let mut slug = String::new();
    for c in route.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug: String = slug.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("home");
    }

    let hash8: String = sha256_hex.chars().take(8).collect();
    format!("screen-{}-{}.{}", slug, hash8, extension)
}

/// Encodes a raw capture and writes it to `store`
///
/// # Arguments
///
/// * `raw` - PNG bytes from the browser
/// * `settings` - Output format, quality and width limit
/// * `route` - The screen's route, used to name the artifact
/// * `store` - Destination store
pub fn store_snapshot(
    raw: &[u8],
    settings: &SnapshotSettings,
    route: &str,
    store: &dyn SnapshotStore,
) -> Result<SnapshotRef, SnapshotError> {
    let encoded = encode_snapshot(raw, settings)?;
    let sha256 = hex::encode(Sha256::digest(&encoded.bytes));
    let name = artifact_name(route, &sha256, encoded.format.extension());

    let id = store.put(&name, &encoded.bytes)?;

    Ok(SnapshotRef {
        id,
        media_type: encoded.format.media_type().to_string(),
        width: encoded.width,
        height: encoded.height,
        bytes: encoded.bytes.len() as u64,
        sha256,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png() -> Vec<u8> {
        let image = RgbImage::from_pixel(32, 16, Rgb([0, 128, 255]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, ImageOutputFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_artifact_name_slug() {
        assert_eq!(
            artifact_name("/Users/42/Edit", "abcdef0123", "png"),
            "screen-users-42-edit-abcdef01.png"
        );
        let long = format!("/{}", "a".repeat(200));
        let name = artifact_name(&long, "00000000", "png");
        assert_eq!(name.len(), "screen-".len() + MAX_SLUG_LEN + "-00000000.png".len());
    }

    #[test]
    fn test_store_and_data_uri() {
        let store = MemorySnapshotStore::new();
        let snapshot = store_snapshot(&png(), &SnapshotSettings::default(), "/reports", &store).unwrap();

        assert!(snapshot.id.starts_with("screen-reports-"));
        assert!(snapshot.id.ends_with(".png"));
        assert_eq!((snapshot.width, snapshot.height), (32, 16));
        assert_eq!(snapshot.sha256.len(), 64);

        let uri = snapshot.data_uri(&store).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }
}
