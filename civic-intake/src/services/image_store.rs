//! Local-disk image storage
//!
//! Files land in the root folder's `uploads/` directory under a random name
//! and are served back by the HTTP layer at `<image_base_url>/<name>`.

use crate::types::{CollaboratorError, ImageStore};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

pub struct LocalImageStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(dir: PathBuf, base_url: &str) -> Self {
        Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "jpg",
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn upload(
        &self,
        image: &[u8],
        content_type: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        if image.is_empty() {
            return Err(CollaboratorError::Storage("empty image".to_string()));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            extension_for(content_type)
        );
        let path = self.dir.join(&name);
        tokio::fs::write(&path, image).await?;

        info!(path = %path.display(), bytes = image.len(), "Image stored");
        Ok(format!("{}/{}", self.base_url, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_writes_file_and_returns_url() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path().join("uploads"), "http://localhost:5780/uploads/");

        let url = store.upload(b"\x89PNG data", Some("image/png")).await.unwrap();
        assert!(url.starts_with("http://localhost:5780/uploads/"));
        assert!(url.ends_with(".png"));

        let name = url.rsplit('/').next().unwrap();
        let stored = std::fs::read(dir.path().join("uploads").join(name)).unwrap();
        assert_eq!(stored, b"\x89PNG data");
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path().to_path_buf(), "http://x");
        assert!(matches!(
            store.upload(b"", None).await,
            Err(CollaboratorError::Storage(_))
        ));
    }

    #[test]
    fn test_extension_defaults_to_jpg() {
        assert_eq!(extension_for(None), "jpg");
        assert_eq!(extension_for(Some("IMAGE/WEBP")), "webp");
        assert_eq!(extension_for(Some("application/octet-stream")), "jpg");
    }
}
