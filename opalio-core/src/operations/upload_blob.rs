use crate::addressing::{KeyDeriver, compute_digest};
use crate::config::{Disposition, StoreConfig};
use crate::error::{OpalError, Result};
use crate::filter::ContentFilter;
use crate::replica::ReplicaClient;
use crate::storage::blob_store::BlobStore;
use crate::storage::metadata_store::{AlternativeName, BlobMeta, MetadataStore};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Content upload: digest, safety filtering, atomic metadata/content
/// persistence, deduplication, and replica fan-out.
#[derive(Clone)]
pub struct UploadBlobOperation {
    metadata_store: Arc<MetadataStore>,
    blob_store: Arc<BlobStore>,
    filter: Arc<ContentFilter>,
    replicas: Option<Arc<ReplicaClient>>,
    keys: KeyDeriver,
    disposition: Disposition,
    require_replica_upload: bool,
}

#[derive(Debug, Clone)]
pub struct UploadBlobOperationRequest {
    pub filename: String,
    pub content_type: String,
    pub body: Bytes,
    /// Identifier from a prior registration, when the client pre-registered.
    pub blob_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadBlobOperationResult {
    pub blob_id: String,
    pub digest: String,
    pub content_type: String,
    pub filename: String,
}

impl UploadBlobOperation {
    pub fn new(
        metadata_store: Arc<MetadataStore>,
        blob_store: Arc<BlobStore>,
        filter: Arc<ContentFilter>,
        replicas: Option<Arc<ReplicaClient>>,
        config: &StoreConfig,
    ) -> Self {
        Self {
            metadata_store,
            blob_store,
            filter,
            replicas,
            keys: KeyDeriver::new(&config.secret),
            disposition: config.disposition,
            require_replica_upload: config.require_replica_upload,
        }
    }

    pub async fn run(
        &self,
        request: UploadBlobOperationRequest,
    ) -> Result<UploadBlobOperationResult> {
        let UploadBlobOperationRequest {
            filename,
            content_type,
            body,
            blob_id,
        } = request;

        let digest = compute_digest(&body);
        if self.filter.digest_forbidden(&digest) {
            tracing::warn!("Forbidden file by hash {}", digest);
            return Err(OpalError::Forbidden(digest));
        }

        let (blob_id, mut meta) = match blob_id {
            None => {
                let id = self.keys.blob_id_for(&digest);
                let meta = BlobMeta::new(id.clone(), digest.clone());
                (id, meta)
            }
            Some(id) => {
                let meta = self.metadata_store.load(&id)?;
                let digest_matches: bool =
                    meta.digest.as_bytes().ct_eq(digest.as_bytes()).into();
                if !digest_matches {
                    return Err(OpalError::HashMismatch {
                        expected: meta.digest.clone(),
                        actual: digest,
                    });
                }
                (id, meta)
            }
        };
        let key = self.keys.storage_key_for(&blob_id);

        // Identical key implies identical bytes: record the new name if it
        // differs, keep the published content untouched.
        if self.blob_store.exists(&key) {
            let mut stored = self.metadata_store.load(&blob_id)?;
            if stored.filename.as_deref() != Some(filename.as_str()) {
                stored.alternatives.push(AlternativeName {
                    created: Utc::now(),
                    filename: filename.clone(),
                });
                self.metadata_store.save(&mut stored, true)?;
            }
            return Ok(UploadBlobOperationResult {
                blob_id,
                digest,
                content_type: stored.content_type.unwrap_or(content_type),
                filename: stored.filename.unwrap_or(filename),
            });
        }

        if self.filter.is_forbidden(&filename, &content_type, &body) {
            tracing::warn!(
                "Forbidden file {} {} {} {}",
                filename,
                content_type,
                blob_id,
                digest
            );
            return Err(OpalError::Forbidden(digest));
        }

        meta.filename = Some(filename.clone());
        meta.content_type = Some(content_type.clone());
        meta.content_disposition = Some(build_disposition(&filename, self.disposition));
        self.metadata_store.save(&mut meta, true)?;

        self.blob_store.write(&key, &body).await?;

        if let Some(replicas) = &self.replicas {
            if let Err(error) = replicas.push(&blob_id, &filename, &content_type, &body).await {
                tracing::error!("Replica failed {}, remove file {} {}", error, blob_id, digest);
                if self.require_replica_upload {
                    self.blob_store.unpublish(&key).await?;
                    return Err(match error {
                        // A secret divergence between peers is a deployment
                        // defect, not a replication outage.
                        config_fault @ OpalError::Config(_) => config_fault,
                        other => OpalError::ReplicaFailed(other.to_string()),
                    });
                }
            }
        }

        Ok(UploadBlobOperationResult {
            blob_id,
            digest,
            content_type,
            filename,
        })
    }
}

/// Content-Disposition header value for a stored filename. Token-safe ASCII
/// names use the bare `filename=` form; anything else gets a sanitized
/// quoted fallback plus an RFC 5987 `filename*` value.
fn build_disposition(filename: &str, disposition: Disposition) -> String {
    let token_safe = !filename.is_empty() && filename.chars().all(is_token_char);
    if token_safe {
        format!("{}; filename={}", disposition.as_str(), filename)
    } else {
        let fallback: String = filename
            .chars()
            .map(|c| {
                if c.is_ascii_graphic() && c != '"' && c != '\\' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            disposition.as_str(),
            fallback,
            urlencoding::encode(filename)
        )
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+' | '!' | '#' | '$' | '&' | '^' | '`' | '~')
}
