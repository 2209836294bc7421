//! Filesystem areas for uploaded and generated images.
//!
//! Names are `<prefix>-<epochMillis>-<random>.<ext>` and files are opened
//! create-new, so the areas are append-only and a name collision surfaces as
//! an I/O error rather than an overwrite.
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::error::AppResult;

pub const UPLOADS_PREFIX: &str = "/uploads";
pub const GENERATED_PREFIX: &str = "/generated";

#[derive(Debug, Clone)]
pub struct AssetStore {
    uploads_dir: PathBuf,
    generated_dir: PathBuf,
    public_base_url: String,
}

impl AssetStore {
    pub fn new(config: &Config) -> Self {
        AssetStore {
            uploads_dir: config.uploads_dir.clone(),
            generated_dir: config.generated_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn generated_dir(&self) -> &Path {
        &self.generated_dir
    }

    pub async fn ensure_dirs(&self) -> AppResult<()> {
        fs::create_dir_all(&self.uploads_dir).await?;
        fs::create_dir_all(&self.generated_dir).await?;
        Ok(())
    }

    pub fn unique_name(prefix: &str, ext: &str) -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        format!("{}-{}-{}.{}", prefix, millis, suffix, ext)
    }

    pub async fn write_upload(&self, name: &str, data: &[u8]) -> AppResult<PathBuf> {
        write_new(&self.uploads_dir, name, data).await
    }

    /// Persist provider output as `generated-<ts>-<rand>.png`; returns the name and path.
    pub async fn write_generated(&self, data: &[u8]) -> AppResult<(String, PathBuf)> {
        let name = Self::unique_name("generated", "png");
        let path = write_new(&self.generated_dir, &name, data).await?;
        Ok((name, path))
    }

    pub fn upload_url(&self, name: &str) -> String {
        format!("{}{}/{}", self.public_base_url, UPLOADS_PREFIX, name)
    }

    pub fn generated_url(&self, name: &str) -> String {
        format!("{}{}/{}", self.public_base_url, GENERATED_PREFIX, name)
    }
}

async fn write_new(dir: &Path, name: &str, data: &[u8]) -> AppResult<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;
    file.write_all(data).await?;
    file.flush().await?;
    let absolute = fs::canonicalize(&path).await.unwrap_or_else(|_| path.clone());
    tracing::debug!(path = %absolute.display(), bytes = data.len(), "Stored asset");
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store_in(dir: &Path) -> AssetStore {
        AssetStore::new(&Config {
            uploads_dir: dir.join("uploads"),
            generated_dir: dir.join("generated"),
            public_base_url: "http://example.test/".to_string(),
            ..Config::default()
        })
    }

    #[test]
    fn names_are_unique_within_one_clock_tick() {
        let names: HashSet<String> = (0..500).map(|_| AssetStore::unique_name("generated", "png")).collect();
        assert_eq!(names.len(), 500);
    }

    #[test]
    fn name_shape() {
        let name = AssetStore::unique_name("image", "webp");
        let parts: Vec<&str> = name.trim_end_matches(".webp").split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "image");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].parse::<u32>().unwrap() < 1_000_000_000);
        assert!(name.ends_with(".webp"));
    }

    #[tokio::test]
    async fn writes_generated_output_and_builds_urls() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dirs().await.unwrap();

        let (name, path) = store.write_generated(b"png-bytes").await.unwrap();
        assert!(name.starts_with("generated-") && name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
        assert_eq!(
            store.generated_url(&name),
            format!("http://example.test/generated/{}", name)
        );
        assert_eq!(store.upload_url("a.png"), "http://example.test/uploads/a.png");
    }

    #[tokio::test]
    async fn never_overwrites_an_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.write_upload("image-1-1.png", b"first").await.unwrap();
        assert!(store.write_upload("image-1-1.png", b"second").await.is_err());
        let kept = std::fs::read(tmp.path().join("uploads/image-1-1.png")).unwrap();
        assert_eq!(kept, b"first");
    }
}
