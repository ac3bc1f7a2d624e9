use super::{BLOB_MODE, DIR_MODE, set_mode};
use crate::addressing::shard_segments;
use crate::error::Result;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

/// Raw content persistence under the sharded directory layout.
///
/// Blob files are immutable once published: `write` never replaces an
/// existing key (callers check `exists` first — identical key implies
/// identical bytes), and published files are made read-only.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn exists(&self, key: &str) -> bool {
        self.blob_path(key).exists()
    }

    /// On-disk path of a published blob, for delivery handoff. Does not open
    /// or stream the file.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.shard_dir(key).join(key)
    }

    /// Stream content to a call-unique temporary file, fsync, then publish
    /// with an atomic rename and drop write permissions.
    pub async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let dir = self.shard_dir(key);
        fs::create_dir_all(&dir).await?;
        set_mode(&dir, DIR_MODE)?;

        let path = self.blob_path(key);
        let tmp = dir.join(format!("{}.{}.tmp", key, Ulid::new()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &path).await?;
        set_mode(&path, BLOB_MODE)?;

        tracing::debug!("Stored blob at key {}", key);
        Ok(())
    }

    /// Rename a published blob out of its served name so it can no longer be
    /// delivered. Used to roll back an upload whose replication failed.
    pub async fn unpublish(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key);
        let parked = self
            .shard_dir(key)
            .join(format!("{}.{}.unpublished", key, Ulid::new()));
        fs::rename(&path, &parked).await?;
        tracing::warn!("Unpublished blob at key {}", key);
        Ok(())
    }

    fn shard_dir(&self, key: &str) -> PathBuf {
        let (first, second) = shard_segments(key);
        self.root.join(first).join(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_exists_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();
        let key = "00112233445566778899aabbccddeeff00112233";

        assert!(!store.exists(key));
        store.write(key, b"payload").await.unwrap();
        assert!(store.exists(key));

        let path = store.blob_path(key);
        assert!(path.ends_with(format!("33/2233/{}", key)));
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn unpublish_hides_the_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();
        let key = "00112233445566778899aabbccddeeff00112233";

        store.write(key, b"payload").await.unwrap();
        store.unpublish(key).await.unwrap();
        assert!(!store.exists(key));
    }
}
