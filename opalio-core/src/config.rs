use crate::dangerous::{DANGEROUS_EXT, DANGEROUS_MIME_TYPES};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Digest of zero-byte content, always forbidden by default.
pub const EMPTY_FILE_DIGEST: &str = "md5:d41d8cd98f00b204e9800998ecf8427e";

pub const DEFAULT_REPLICA_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REPLICA_MAX_RETRY: u32 = 10;

/// Content-Disposition mode applied to uploaded files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Immutable blocklists consulted on every register/upload/read.
///
/// Built once at startup and passed into the engine constructors; never
/// mutated afterwards. Extensions are kept uppercase, media types lowercase,
/// digests in tagged lowercase form.
#[derive(Debug, Clone)]
pub struct ForbiddenSets {
    extensions: HashSet<String>,
    media_types: HashSet<String>,
    digests: HashSet<String>,
}

impl Default for ForbiddenSets {
    fn default() -> Self {
        Self {
            extensions: DANGEROUS_EXT.iter().map(|s| s.to_string()).collect(),
            media_types: DANGEROUS_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
            digests: [EMPTY_FILE_DIGEST.to_string()].into(),
        }
    }
}

impl ForbiddenSets {
    pub fn extension_forbidden(&self, extension: &str) -> bool {
        self.extensions.contains(&extension.to_ascii_uppercase())
    }

    pub fn media_type_forbidden(&self, media_type: &str) -> bool {
        self.media_types.contains(&media_type.to_ascii_lowercase())
    }

    pub fn digest_forbidden(&self, digest: &str) -> bool {
        self.digests.contains(&digest.to_ascii_lowercase())
    }

    /// Replace the extension set from a comma-separated list.
    pub fn set_extensions_csv(&mut self, csv: &str) {
        self.extensions = csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_uppercase)
            .collect();
    }

    /// Replace the media-type set from a list file, one type per line.
    /// Lines without a `/` are ignored.
    pub fn load_media_types(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        self.media_types = contents
            .lines()
            .map(str::trim)
            .filter(|line| line.contains('/'))
            .map(str::to_ascii_lowercase)
            .collect();
        Ok(())
    }

    /// Replace the digest set from a list file, one tagged digest per line.
    /// Lines not starting with `md5:` are ignored.
    pub fn load_digests(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        self.digests = contents
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("md5:"))
            .map(str::to_ascii_lowercase)
            .collect();
        Ok(())
    }

    pub fn add_digest(&mut self, digest: impl Into<String>) {
        self.digests.insert(digest.into().to_ascii_lowercase());
    }
}

/// Everything the storage engine needs, resolved at startup.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// On-disk root of the sharded store.
    pub save_root: PathBuf,
    /// Web-facing root of delivery locations handed to the accelerated
    /// delivery layer.
    pub web_root: String,
    /// Shared secret for identifier and storage-key derivation. Must match
    /// across replicas.
    pub secret: String,
    pub disposition: Disposition,
    pub forbidden: ForbiddenSets,
    /// Replica endpoints, `[scheme://][user:pass@]host[:port]`.
    pub replica_endpoints: Vec<String>,
    /// When set, an upload that cannot reach every replica is rolled back.
    pub require_replica_upload: bool,
    pub replica_timeout_secs: u64,
    pub replica_max_retry: u32,
}

impl StoreConfig {
    pub fn new(
        save_root: impl Into<PathBuf>,
        web_root: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            save_root: save_root.into(),
            web_root: web_root.into(),
            secret: secret.into(),
            disposition: Disposition::default(),
            forbidden: ForbiddenSets::default(),
            replica_endpoints: Vec::new(),
            require_replica_upload: true,
            replica_timeout_secs: DEFAULT_REPLICA_TIMEOUT_SECS,
            replica_max_retry: DEFAULT_REPLICA_MAX_RETRY,
        }
    }

    /// Delivery root for records flagged as archived.
    pub fn archive_web_root(&self) -> String {
        format!("{}.archive", self.web_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_forbid_the_empty_file() {
        let sets = ForbiddenSets::default();
        assert!(sets.digest_forbidden(EMPTY_FILE_DIGEST));
        assert!(sets.extension_forbidden("exe"));
        assert!(sets.extension_forbidden("EXE"));
        assert!(sets.media_type_forbidden("Application/X-Msdownload"));
    }

    #[test]
    fn extension_csv_replaces_defaults() {
        let mut sets = ForbiddenSets::default();
        sets.set_extensions_csv(" exe , , bin ");
        assert!(sets.extension_forbidden("EXE"));
        assert!(sets.extension_forbidden("bin"));
        assert!(!sets.extension_forbidden("BAT"));
    }

    #[test]
    fn list_files_filter_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mime_path = dir.path().join("mime.txt");
        std::fs::write(&mime_path, "application/x-evil\nnot a type\n TEXT/BAD \n").unwrap();
        let hash_path = dir.path().join("hash.txt");
        std::fs::write(&hash_path, "md5:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\nsha1:ffff\n").unwrap();

        let mut sets = ForbiddenSets::default();
        sets.load_media_types(&mime_path).unwrap();
        sets.load_digests(&hash_path).unwrap();

        assert!(sets.media_type_forbidden("application/x-evil"));
        assert!(sets.media_type_forbidden("text/bad"));
        assert!(!sets.media_type_forbidden("application/x-msdownload"));
        assert!(sets.digest_forbidden(&format!("md5:{}", "a".repeat(32))));
        assert!(!sets.digest_forbidden(EMPTY_FILE_DIGEST));
    }
}
