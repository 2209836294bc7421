//! Allow-list validation for uploaded images.
//!
//! Extension, declared media type and size are all checked before anything
//! is written, so a rejected upload leaves no file behind.
use std::path::Path;

use crate::error::AppResult;
use crate::storage::AssetStore;
use crate::upload::{UploadError, UploadedAsset};

pub const ALLOWED_IMAGE_TYPES: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadValidator {
    allowed: Vec<String>,
    max_bytes: u64,
}

impl Default for UploadValidator {
    fn default() -> Self {
        UploadValidator::new(ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES)
    }
}

impl UploadValidator {
    /// `allowed` narrows the image allow-list for a deployment.
    pub fn new(allowed: &[&str], max_bytes: u64) -> Self {
        UploadValidator {
            allowed: allowed.iter().map(|s| s.to_ascii_lowercase()).collect(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check a file against the allow-list and size ceiling.
    ///
    /// Returns the lower-cased extension on success.
    pub fn validate(&self, file_name: &str, media_type: &str, size: u64) -> Result<String, UploadError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| UploadError::MissingExtension(file_name.to_string(), self.allowed_list()))?;

        if !self.allowed.iter().any(|a| *a == ext) {
            return Err(UploadError::UnsupportedExtension(ext, self.allowed_list()));
        }

        // Textual match, e.g. "image/jpeg" contains "jpeg".
        let media = media_type.to_ascii_lowercase();
        if !self.allowed.iter().any(|a| media.contains(a.as_str())) {
            return Err(UploadError::UnsupportedMediaType(media_type.to_string(), self.allowed_list()));
        }

        if size > self.max_bytes {
            return Err(UploadError::TooLarge { size, max: self.max_bytes });
        }

        Ok(ext)
    }

    /// Validate and persist an upload under `<field>-<millis>-<rand>.<ext>`.
    pub async fn accept(
        &self,
        store: &AssetStore,
        field: &str,
        file_name: &str,
        media_type: &str,
        data: &[u8],
    ) -> AppResult<UploadedAsset> {
        let ext = self.validate(file_name, media_type, data.len() as u64)?;
        let storage_name = AssetStore::unique_name(field, &ext);
        let absolute_path = store.write_upload(&storage_name, data).await?;

        tracing::info!(
            original = %file_name,
            stored = %storage_name,
            size = data.len(),
            "Accepted upload"
        );

        Ok(UploadedAsset {
            storage_name,
            original_name: file_name.to_string(),
            absolute_path,
            size_bytes: data.len() as u64,
            declared_media_type: media_type.to_string(),
        })
    }

    fn allowed_list(&self) -> String {
        self.allowed.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::AppError;

    #[test]
    fn rejects_disallowed_extensions_whatever_the_media_type() {
        let validator = UploadValidator::default();
        for name in ["shoe.bmp", "shoe.svg", "shoe.tiff", "shoe.exe", "shoe.png.txt", "shoe.pngx"] {
            for media in ["image/png", "image/jpeg", "application/octet-stream"] {
                let err = validator.validate(name, media, 1024).unwrap_err();
                assert!(
                    matches!(err, UploadError::UnsupportedExtension(..)),
                    "{} / {} gave {:?}",
                    name,
                    media,
                    err
                );
            }
        }
    }

    #[test]
    fn requires_an_extension() {
        let err = UploadValidator::default().validate("README", "image/png", 10).unwrap_err();
        assert!(matches!(err, UploadError::MissingExtension(..)));
    }

    #[test]
    fn rejects_mismatched_media_type() {
        let err = UploadValidator::default()
            .validate("shoe.png", "application/pdf", 10)
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedMediaType(..)));
    }

    #[test]
    fn accepts_every_allowed_type_up_to_the_ceiling() {
        let validator = UploadValidator::default();
        for (name, media) in [
            ("a.jpeg", "image/jpeg"),
            ("a.JPG", "image/jpeg"),
            ("a.png", "image/png"),
            ("a.gif", "image/gif"),
            ("a.webp", "image/webp"),
        ] {
            let ext = validator.validate(name, media, MAX_UPLOAD_BYTES).unwrap();
            assert_eq!(ext, name.rsplit('.').next().unwrap().to_ascii_lowercase());
        }
    }

    #[test]
    fn rejects_files_over_ten_mebibytes() {
        let err = UploadValidator::default()
            .validate("a.png", "image/png", MAX_UPLOAD_BYTES + 1)
            .unwrap_err();
        assert_eq!(err, UploadError::TooLarge { size: MAX_UPLOAD_BYTES + 1, max: MAX_UPLOAD_BYTES });
    }

    #[test]
    fn empty_file_with_allowed_type_is_accepted() {
        let ext = UploadValidator::default().validate("a.png", "image/png", 0).unwrap();
        assert_eq!(ext, "png");
    }

    #[test]
    fn narrower_allow_list() {
        let validator = UploadValidator::new(&["png"], MAX_UPLOAD_BYTES);
        assert!(validator.validate("a.png", "image/png", 1).is_ok());
        assert!(validator.validate("a.jpg", "image/jpeg", 1).is_err());
    }

    #[tokio::test]
    async fn accept_stores_under_a_generated_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AssetStore::new(&Config {
            uploads_dir: tmp.path().join("uploads"),
            ..Config::default()
        });

        let asset = UploadValidator::default()
            .accept(&store, "image", "jacket.webp", "image/webp", b"RIFFdata")
            .await
            .unwrap();

        assert!(asset.storage_name.starts_with("image-"));
        assert!(asset.storage_name.ends_with(".webp"));
        assert_eq!(asset.size_bytes, 8);
        assert_eq!(std::fs::read(&asset.absolute_path).unwrap(), b"RIFFdata");
    }

    #[tokio::test]
    async fn rejected_upload_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = tmp.path().join("uploads");
        let store = AssetStore::new(&Config { uploads_dir: uploads.clone(), ..Config::default() });

        let err = UploadValidator::default()
            .accept(&store, "image", "payload.exe", "image/png", b"MZ")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Upload(UploadError::UnsupportedExtension(..))));
        assert!(!uploads.exists() || std::fs::read_dir(&uploads).unwrap().next().is_none());
    }
}
