use super::{DIR_MODE, META_MODE, set_mode};
use crate::addressing::{KeyDeriver, shard_segments};
use crate::config::StoreConfig;
use crate::error::{OpalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use ulid::Ulid;

pub const META_SCHEMA_VERSION: u32 = 1;

/// Blob metadata as stored on disk, one JSON file per identifier.
///
/// The schema is fixed and versioned; unknown fields found on disk are
/// tolerated on parse so newer writers stay readable. Once `filename` and
/// `content_type` are set they never change; re-submissions under other
/// names only append to `alternatives`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMeta {
    #[serde(default = "default_schema_version")]
    pub schema: u32,
    pub blob_id: String,
    pub digest: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<AlternativeName>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub archived: bool,
}

/// Alternative filename recorded when identical content is re-submitted
/// under a different name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeName {
    pub created: DateTime<Utc>,
    pub filename: String,
}

fn default_schema_version() -> u32 {
    META_SCHEMA_VERSION
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl BlobMeta {
    /// Minimal placeholder record created by registration.
    pub fn new(blob_id: String, digest: String) -> Self {
        Self {
            schema: META_SCHEMA_VERSION,
            blob_id,
            digest,
            created: Utc::now(),
            modified: None,
            filename: None,
            content_type: None,
            content_disposition: None,
            alternatives: Vec::new(),
            archived: false,
        }
    }
}

/// Per-identifier record persistence with atomic publish.
///
/// Records are written to a call-unique temporary file and renamed into
/// place, so a concurrent reader sees either the old record or the new one,
/// never a partial write. The rename is the only publish step; no lock is
/// held.
pub struct MetadataStore {
    root: PathBuf,
    keys: KeyDeriver,
}

impl MetadataStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.save_root.clone(),
            keys: KeyDeriver::new(&config.secret),
        }
    }

    /// Persist a record. Fails with `ContentUploaded` when a record already
    /// exists and `overwrite` is false. Stamps `modified` on every save.
    pub fn save(&self, meta: &mut BlobMeta, overwrite: bool) -> Result<()> {
        let key = self.keys.storage_key_for(&meta.blob_id);
        let (dir, path) = self.meta_path(&key);
        if !overwrite && path.exists() {
            return Err(OpalError::ContentUploaded(meta.blob_id.clone()));
        }
        meta.modified = Some(Utc::now());

        fs::create_dir_all(&dir)?;
        set_mode(&dir, DIR_MODE)?;

        let tmp = dir.join(format!("{}.meta.{}.tmp", key, Ulid::new()));
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&serde_json::to_vec(meta)?)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &path)?;
        set_mode(&path, META_MODE)?;
        Ok(())
    }

    /// Load the record for an identifier, or `NotFound`.
    pub fn load(&self, blob_id: &str) -> Result<BlobMeta> {
        let key = self.keys.storage_key_for(blob_id);
        let (_, path) = self.meta_path(&key);
        if !path.exists() {
            return Err(OpalError::NotFound(blob_id.to_string()));
        }
        let data = fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn meta_path(&self, key: &str) -> (PathBuf, PathBuf) {
        let (first, second) = shard_segments(key);
        let dir = self.root.join(first).join(second);
        let path = dir.join(format!("{}.meta", key));
        (dir, path)
    }
}
