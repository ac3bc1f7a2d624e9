use crate::addressing::{KeyDeriver, shard_segments};
use crate::config::StoreConfig;
use crate::error::{OpalError, Result};
use crate::filter::ContentFilter;
use crate::storage::blob_store::BlobStore;
use crate::storage::metadata_store::{BlobMeta, MetadataStore};
use std::sync::Arc;

/// Resolution of an identifier to its stored record and delivery location.
/// The bytes themselves are streamed by the delivery layer, not here.
#[derive(Clone)]
pub struct ReadBlobOperation {
    metadata_store: Arc<MetadataStore>,
    blob_store: Arc<BlobStore>,
    filter: Arc<ContentFilter>,
    keys: KeyDeriver,
    web_root: String,
    archive_web_root: String,
}

#[derive(Debug, Clone)]
pub struct ReadBlobOperationRequest {
    pub blob_id: String,
}

#[derive(Debug, Clone)]
pub struct ReadBlobOperationResult {
    pub meta: BlobMeta,
    /// Shard-relative location handed to the accelerated delivery layer.
    pub location: String,
    pub content_disposition: Option<String>,
}

impl ReadBlobOperation {
    pub fn new(
        metadata_store: Arc<MetadataStore>,
        blob_store: Arc<BlobStore>,
        filter: Arc<ContentFilter>,
        config: &StoreConfig,
    ) -> Self {
        Self {
            metadata_store,
            blob_store,
            filter,
            keys: KeyDeriver::new(&config.secret),
            web_root: config.web_root.trim_end_matches('/').to_string(),
            archive_web_root: config.archive_web_root().trim_end_matches('/').to_string(),
        }
    }

    pub fn run(&self, request: ReadBlobOperationRequest) -> Result<ReadBlobOperationResult> {
        let ReadBlobOperationRequest { blob_id } = request;

        let meta = self.metadata_store.load(&blob_id)?;
        // A record claiming another identifier is corrupt or misplaced.
        if meta.blob_id != blob_id {
            return Err(OpalError::NotFound(blob_id));
        }
        // Content can be blocklisted after the fact; it then stops resolving.
        if self.filter.digest_forbidden(&meta.digest) {
            return Err(OpalError::NotFound(blob_id));
        }

        let key = self.keys.storage_key_for(&blob_id);
        // Registered-but-never-uploaded and rolled-back content has a record
        // but nothing published to serve.
        if !self.blob_store.exists(&key) {
            return Err(OpalError::NotFound(blob_id));
        }

        let web_root = if meta.archived {
            &self.archive_web_root
        } else {
            &self.web_root
        };
        let (first, second) = shard_segments(&key);
        let location = format!("{}/{}/{}/{}", web_root, first, second, key);

        Ok(ReadBlobOperationResult {
            content_disposition: meta.content_disposition.clone(),
            meta,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::compute_digest;
    use crate::config::ForbiddenSets;

    fn components(config: &StoreConfig) -> (Arc<MetadataStore>, Arc<BlobStore>, Arc<ContentFilter>) {
        (
            Arc::new(MetadataStore::new(config)),
            Arc::new(BlobStore::new(&config.save_root).unwrap()),
            Arc::new(ContentFilter::new(config.forbidden.clone())),
        )
    }

    async fn publish(config: &StoreConfig, digest: &str, body: &[u8]) -> String {
        let (metadata_store, blob_store, _) = components(config);
        let keys = KeyDeriver::new(&config.secret);
        let blob_id = keys.blob_id_for(digest);
        let mut meta = BlobMeta::new(blob_id.clone(), digest.to_string());
        meta.filename = Some("file.txt".to_string());
        metadata_store.save(&mut meta, false).unwrap();
        blob_store
            .write(&keys.storage_key_for(&blob_id), body)
            .await
            .unwrap();
        blob_id
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path(), "/files", "secret");
        let (metadata_store, blob_store, filter) = components(&config);
        let op = ReadBlobOperation::new(metadata_store, blob_store, filter, &config);
        assert!(matches!(
            op.run(ReadBlobOperationRequest {
                blob_id: "missing".to_string(),
            }),
            Err(OpalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn registered_without_content_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path(), "/files", "secret");
        let (metadata_store, blob_store, filter) = components(&config);

        let keys = KeyDeriver::new(&config.secret);
        let blob_id = keys.blob_id_for(&format!("md5:{}", "0".repeat(32)));
        let mut meta = BlobMeta::new(blob_id.clone(), format!("md5:{}", "0".repeat(32)));
        metadata_store.save(&mut meta, false).unwrap();

        let op = ReadBlobOperation::new(metadata_store, blob_store, filter, &config);
        assert!(matches!(
            op.run(ReadBlobOperationRequest { blob_id }),
            Err(OpalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn blocklisted_digest_stops_resolving() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::new(dir.path(), "/files", "secret");
        let digest = compute_digest(b"payload");
        let blob_id = publish(&config, &digest, b"payload").await;

        let mut forbidden = ForbiddenSets::default();
        forbidden.add_digest(digest);
        config.forbidden = forbidden;
        let (metadata_store, blob_store, filter) = components(&config);
        let op = ReadBlobOperation::new(metadata_store, blob_store, filter, &config);
        assert!(matches!(
            op.run(ReadBlobOperationRequest { blob_id }),
            Err(OpalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn archived_records_resolve_under_the_archive_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path(), "/files", "secret");
        let digest = compute_digest(b"payload");
        let blob_id = publish(&config, &digest, b"payload").await;

        let (metadata_store, blob_store, filter) = components(&config);
        let mut meta = metadata_store.load(&blob_id).unwrap();
        meta.archived = true;
        metadata_store.save(&mut meta, true).unwrap();

        let op = ReadBlobOperation::new(metadata_store, blob_store, filter, &config);
        let read = op.run(ReadBlobOperationRequest { blob_id }).unwrap();
        assert!(read.location.starts_with("/files.archive/"));
    }
}
