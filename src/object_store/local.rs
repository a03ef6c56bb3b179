use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and testing.
///
/// Objects are served back by the API's `/objects/*name` route, so URLs are
/// built from the service's public base URL.
pub struct LocalStore {
    base_path: PathBuf,
    public_base_url: Url,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P, public_base_url: &str) -> Result<Self, anyhow::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        let public_base_url = Url::parse(public_base_url)?;
        if public_base_url.cannot_be_a_base() {
            anyhow::bail!("public base URL '{public_base_url}' is not a base URL");
        }
        Ok(Self {
            base_path,
            public_base_url,
        })
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, ObjectStoreError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(ObjectStoreError::InvalidName(name.to_string()));
        }
        Ok(self.base_path.join(name))
    }
}

/// Await `write` into a freshly created file; if it fails, remove the file so
/// no partial object is left under the name.
async fn remove_on_error<F>(path: &Path, write: F) -> Result<(), ObjectStoreError>
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = write.await {
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial object");
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let path = self.object_path(name)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ObjectStoreError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        remove_on_error(&path, async {
            file.write_all(&data).await?;
            file.flush().await
        })
        .await?;
        Ok(self.url_for(name))
    }

    async fn get(&self, name: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(name)?;
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(name.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(name)?;
        Ok(path.exists())
    }

    async fn list(&self) -> Result<Vec<String>, ObjectStoreError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn url_for(&self, name: &str) -> String {
        let mut url = self.public_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("objects").push(name);
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1000-partial.png");
        tokio::fs::write(&path, b"half").await.unwrap();

        let result = remove_on_error(&path, async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        })
        .await;

        assert!(matches!(result, Err(ObjectStoreError::Io(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_successful_write_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1000-whole.png");
        tokio::fs::write(&path, b"whole").await.unwrap();

        remove_on_error(&path, async { Ok(()) }).await.unwrap();
        assert!(path.exists());
    }
}
