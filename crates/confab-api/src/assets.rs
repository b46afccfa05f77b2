use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, error, info};

use crate::error::{ApiError, ApiResult};

/// 10 MB cap on decoded image payloads.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Local image store backing profile avatars and message attachments.
///
/// Accepts `data:image/...;base64,` payloads, writes the decoded bytes
/// content-addressed under the media directory, and hands back the
/// `/media/...` URL that gets persisted in place of the payload.
/// Re-uploading identical bytes lands on the same file.
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub async fn new(dir: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Decode an image data URI, store the bytes, return the serving URL.
    pub async fn store_data_uri(&self, data_uri: &str) -> ApiResult<String> {
        let (ext, payload) = split_data_uri(data_uri)
            .ok_or_else(|| ApiError::Validation("Invalid image payload".into()))?;

        let bytes = B64
            .decode(payload)
            .map_err(|_| ApiError::Validation("Invalid image payload".into()))?;

        if bytes.is_empty() {
            return Err(ApiError::Validation("Invalid image payload".into()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::Validation("Image too large".into()));
        }

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let filename = format!("{}.{}", hex::encode(hasher.finalize()), ext);

        let path = self.dir.join(&filename);
        fs::write(&path, &bytes).await.map_err(|e| {
            error!("Failed to write {}: {}", path.display(), e);
            ApiError::Upstream("Image upload failed".into())
        })?;

        debug!("Stored {} byte image as {}", bytes.len(), filename);
        Ok(format!("/media/{}", filename))
    }
}

/// Accepted image types, each mapped to the extension its file gets.
fn split_data_uri(data_uri: &str) -> Option<(&'static str, &str)> {
    let rest = data_uri.strip_prefix("data:image/")?;
    let (subtype, payload) = rest.split_once(";base64,")?;
    let ext = match subtype {
        "png" => "png",
        "jpeg" | "jpg" => "jpg",
        "gif" => "gif",
        "webp" => "webp",
        _ => return None,
    };
    Some((ext, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[tokio::test]
    async fn stores_png_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path().to_path_buf()).await.unwrap();

        let url = store.store_data_uri(TINY_PNG).await.unwrap();
        assert!(url.starts_with("/media/"));
        assert!(url.ends_with(".png"));

        let filename = url.strip_prefix("/media/").unwrap();
        assert!(dir.path().join(filename).exists());

        // Same bytes resolve to the same URL
        let again = store.store_data_uri(TINY_PNG).await.unwrap();
        assert_eq!(url, again);
    }

    #[tokio::test]
    async fn rejects_junk_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path().to_path_buf()).await.unwrap();

        for bad in [
            "not a data uri",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64,!!!not-base64!!!",
            "data:image/tiff;base64,aGVsbG8=",
            "data:image/png;base64,",
        ] {
            let err = store.store_data_uri(bad).await.unwrap_err();
            assert!(
                matches!(err, ApiError::Validation(_)),
                "expected validation error for {:?}, got {:?}",
                bad,
                err
            );
        }
    }
}
