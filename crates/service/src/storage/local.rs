use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::errors::ServiceError;

use super::ObjectStore;

/// Filesystem-backed object store rooted under the data directory.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

/// Keep only characters that cannot escape the storage directory.
fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        folder: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, ServiceError> {
        let folder = sanitize(folder);
        let filename = sanitize(filename);
        if filename.is_empty() {
            return Err(ServiceError::Validation("filename required".into()));
        }

        let dir = self.root.join(&folder);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        let path = dir.join(&filename);
        fs::write(&path, bytes)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        debug!(path = %path.display(), content_type, size = bytes.len(), "object stored");
        Ok(format!("{folder}/{filename}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_writes_and_returns_relative_path() -> Result<(), anyhow::Error> {
        let root = std::env::temp_dir().join(format!("object_store_{}", uuid::Uuid::new_v4()));
        let store = LocalObjectStore::new(&root);

        let path = store.put("avatar", "user.png", "image/png", b"png-bytes").await?;
        assert_eq!(path, "avatar/user.png");
        let stored = tokio::fs::read(root.join("avatar/user.png")).await?;
        assert_eq!(stored, b"png-bytes");

        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }

    #[tokio::test]
    async fn put_strips_path_traversal() -> Result<(), anyhow::Error> {
        let root = std::env::temp_dir().join(format!("object_store_{}", uuid::Uuid::new_v4()));
        let store = LocalObjectStore::new(&root);

        let path = store.put("avatar", "../../etc/passwd", "text/plain", b"x").await?;
        assert_eq!(path, "avatar/....etcpasswd");
        assert!(root.join("avatar").join("....etcpasswd").exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }
}
