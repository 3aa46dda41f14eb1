//! Local filesystem media storage.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use yatube_core::ports::{MediaStorage, StorageError};

/// Attempts at a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Stores uploads under a root directory and serves them below a URL prefix.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path inside the root. Only plain relative paths
    /// are accepted.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// `posts/cat.gif` -> `posts/cat_1a2b3c4.gif`
    fn alternative_key(key: &str) -> String {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
        let (dir, file) = match key.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, key),
        };
        let file = match file.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
            None => format!("{file}_{suffix}"),
        };
        match dir {
            Some(dir) => format!("{dir}/{file}"),
            None => file,
        }
    }
}

/// Write `data` to a freshly created file, removing the file again if the
/// write does not complete.
async fn write_or_remove<W>(mut file: W, path: &Path, data: &[u8]) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(data).await?;
        file.flush().await
    }
    .await;
    drop(file);

    let Err(e) = written else {
        return Ok(());
    };
    if let Err(remove_err) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove partial upload");
    }
    Err(StorageError::Io(format!("Failed to write file: {e}")))
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, key: &str, data: &[u8]) -> Result<String, StorageError> {
        let mut candidate = key.to_string();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.path_for(&candidate)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::Io(format!("Failed to create directory: {e}")))?;
            }

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    write_or_remove(file, &path, data).await?;
                    tracing::debug!(key = %candidate, bytes = data.len(), "Stored media file");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = Self::alternative_key(key);
                }
                Err(e) => return Err(StorageError::Io(format!("Failed to create file: {e}"))),
            }
        }

        Err(StorageError::Io(format!("No free name for {key}")))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let Ok(path) = self.path_for(key) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(format!("Failed to read file: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("Failed to delete file: {e}"))),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;

    /// Accepts nothing; every write fails.
    struct BrokenDisk;

    impl AsyncWrite for BrokenDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::other("disk full")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn save_read_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalMediaStorage::new(dir.path(), "/media/");

        let key = storage.save("posts/small.gif", b"GIF89a").await.unwrap();
        assert_eq!(key, "posts/small.gif");
        assert_eq!(
            storage.read(&key).await.unwrap().as_deref(),
            Some(&b"GIF89a"[..])
        );

        storage.delete(&key).await.unwrap();
        assert_eq!(storage.read(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn taken_name_gets_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalMediaStorage::new(dir.path(), "/media");

        let first = storage.save("posts/cat.gif", b"one").await.unwrap();
        let second = storage.save("posts/cat.gif", b"two").await.unwrap();

        assert_ne!(first, second);
        assert!(second.starts_with("posts/cat_"));
        assert!(second.ends_with(".gif"));
        assert_eq!(storage.read(&first).await.unwrap().as_deref(), Some(&b"one"[..]));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalMediaStorage::new(dir.path(), "/media/");

        assert!(matches!(
            storage.save("../escape.gif", b"x").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert_eq!(storage.read("/etc/passwd").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.gif");
        tokio::fs::write(&path, b"").await.unwrap();

        let result = write_or_remove(BrokenDisk, &path, b"GIF89a").await;

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(!path.exists());
    }

    #[test]
    fn url_joins_base_and_key() {
        let storage = LocalMediaStorage::new("media", "/media");
        assert_eq!(storage.url("posts/cat.gif"), "/media/posts/cat.gif");
    }
}
