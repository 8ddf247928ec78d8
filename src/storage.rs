use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncRead;

pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte-stream storage addressed by key. `delete` of an absent key succeeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes) -> anyhow::Result<()>;
    async fn open(&self, key: &str) -> anyhow::Result<Option<BlobReader>>;
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        anyhow::ensure!(plain, "invalid blob key: {:?}", key);
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create_dir_all {}", parent.display()))?;
        }
        fs::write(&path, &body)
            .await
            .with_context(|| format!("write blob {}", key))?;
        Ok(())
    }

    async fn open(&self, key: &str) -> anyhow::Result<Option<BlobReader>> {
        let path = self.resolve(key)?;
        match fs::File::open(&path).await {
            Ok(file) => {
                let reader: BlobReader = Box::new(file);
                Ok(Some(reader))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("open blob {}", key)),
        }
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let path = self.resolve(key)?;
        fs::try_exists(&path)
            .await
            .with_context(|| format!("stat blob {}", key))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key, "blob already absent");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("delete blob {}", key)),
        }
    }
}

/// Deletes every key, logging failures instead of aborting. Used after the
/// owning rows are gone, when a leftover blob is only wasted space.
pub async fn purge_blobs(store: &dyn BlobStore, keys: &[String]) -> usize {
    let mut removed = 0;
    for key in keys {
        match store.delete(key).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(key = %key, error = ?e, "failed to purge blob"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio_test::{assert_err, assert_ok};

    fn temp_store() -> LocalBlobStore {
        let dir = std::env::temp_dir().join(format!("jobboard-blobs-{}", uuid::Uuid::new_v4()));
        LocalBlobStore::new(dir)
    }

    #[tokio::test]
    async fn put_open_delete_cycle() {
        let store = temp_store();
        let key = "cv_files/7/resume.pdf";
        assert_ok!(store.put(key, Bytes::from_static(b"%PDF-1.4 body")).await);
        assert!(store.exists(key).await.unwrap());

        let mut reader = store.open(key).await.unwrap().expect("blob present");
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"%PDF-1.4 body");

        assert_ok!(store.delete(key).await);
        assert!(!store.exists(key).await.unwrap());
        assert!(store.open(key).await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn deleting_absent_blob_is_not_an_error() {
        let store = temp_store();
        assert_ok!(store.delete("cv_files/1/missing.pdf").await);
        assert_ok!(store.delete("cv_files/1/missing.pdf").await);
    }

    #[tokio::test]
    async fn exists_reports_io_errors() {
        let store = temp_store();
        assert_ok!(store.put("cv_files/3/a.pdf", Bytes::from_static(b"%PDF")).await);
        // a regular file used as a directory is ENOTDIR, not "absent"
        assert_err!(store.exists("cv_files/3/a.pdf/inner").await);
        assert!(!store.exists("cv_files/3/b.pdf").await.unwrap());

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let store = temp_store();
        assert_err!(store.put("../escape.pdf", Bytes::new()).await);
        assert_err!(store.delete("/etc/passwd").await);
        assert!(store.open("").await.is_err());
    }

    #[tokio::test]
    async fn purge_continues_past_failures() {
        let mut mock = MockBlobStore::new();
        mock.expect_delete()
            .withf(|key| key.to_string() == "a")
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("disk on fire")));
        mock.expect_delete()
            .withf(|key| key.to_string() == "b")
            .times(1)
            .returning(|_| Ok(()));

        let removed = purge_blobs(&mock, &["a".to_string(), "b".to_string()]).await;
        assert_eq!(removed, 1);
    }
}
