//! Validated intake of caller-supplied images.
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub mod validator;

pub use validator::{UploadValidator, ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES};

/// An image that passed validation and now lives in the upload area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedAsset {
    pub storage_name: String,
    pub original_name: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    pub declared_media_type: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("File '{0}' has no extension; only image files are allowed ({1})")]
    MissingExtension(String, String),

    #[error("File extension '.{0}' is not allowed; only image files are allowed ({1})")]
    UnsupportedExtension(String, String),

    #[error("Media type '{0}' is not allowed; only image files are allowed ({1})")]
    UnsupportedMediaType(String, String),

    #[error("File is too large: {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("Malformed upload: {0}")]
    Malformed(String),
}
