use crate::addressing::KeyDeriver;
use crate::config::StoreConfig;
use crate::error::{OpalError, Result};
use crate::filter::ContentFilter;
use crate::storage::metadata_store::{BlobMeta, MetadataStore};
use std::sync::Arc;

/// Pre-registration of a content digest: reserves the identifier and a
/// placeholder record before any bytes are sent.
#[derive(Clone)]
pub struct RegisterBlobOperation {
    metadata_store: Arc<MetadataStore>,
    filter: Arc<ContentFilter>,
    keys: KeyDeriver,
}

#[derive(Debug, Clone)]
pub struct RegisterBlobOperationRequest {
    /// Tagged content digest, already format-validated by the boundary.
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct RegisterBlobOperationResult {
    pub blob_id: String,
}

impl RegisterBlobOperation {
    pub fn new(
        metadata_store: Arc<MetadataStore>,
        filter: Arc<ContentFilter>,
        config: &StoreConfig,
    ) -> Self {
        Self {
            metadata_store,
            filter,
            keys: KeyDeriver::new(&config.secret),
        }
    }

    pub fn run(&self, request: RegisterBlobOperationRequest) -> Result<RegisterBlobOperationResult> {
        let RegisterBlobOperationRequest { digest } = request;

        if self.filter.digest_forbidden(&digest) {
            tracing::warn!("Forbidden file by hash {}", digest);
            return Err(OpalError::Forbidden(digest));
        }

        let blob_id = self.keys.blob_id_for(&digest);
        let mut meta = BlobMeta::new(blob_id.clone(), digest);
        match self.metadata_store.save(&mut meta, false) {
            Ok(()) => {}
            // Registering the same digest twice is not an error.
            Err(OpalError::ContentUploaded(_)) => {}
            Err(error) => return Err(error),
        }

        Ok(RegisterBlobOperationResult { blob_id })
    }
}
