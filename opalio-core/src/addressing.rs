use crate::error::{OpalError, Result};
use md5::Md5;
use sha1::{Digest, Sha1};

/// Compute the tagged content digest of raw bytes.
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("md5:{}", hex::encode(hasher.finalize()))
}

/// Boundary-layer check of a client-supplied digest string.
///
/// The error messages are part of the service contract; clients match on them.
pub fn validate_digest(digest: &str) -> Result<()> {
    let Some((algorithm, value)) = digest.split_once(':') else {
        return Err(OpalError::InvalidRequest(
            "Hash type is not supported.".to_string(),
        ));
    };
    if algorithm != "md5" {
        return Err(OpalError::InvalidRequest(
            "Hash type is not supported.".to_string(),
        ));
    }
    if value.len() != 32 {
        return Err(OpalError::InvalidRequest(
            "Hash value is wrong length.".to_string(),
        ));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(OpalError::InvalidRequest(
            "Hash value is not hexadecimal.".to_string(),
        ));
    }
    Ok(())
}

/// Suffix segments used for the two-level shard layout: last 2 chars, then
/// last 4 chars of a storage key. Keys are always 40 hex chars.
pub fn shard_segments(key: &str) -> (&str, &str) {
    (&key[key.len() - 2..], &key[key.len() - 4..])
}

/// Secret-keyed derivation of blob identifiers and storage keys.
///
/// Both derivations are one-way without the secret: identifiers do not reveal
/// digests, and storage keys do not reveal identifiers, so leaking one token
/// never exposes the rest of the layout.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    secret: String,
}

impl KeyDeriver {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// External identifier for a content digest. Stable for the lifetime of
    /// the content.
    pub fn blob_id_for(&self, digest: &str) -> String {
        sha1_hex(&format!("{}:blob:{}", digest, self.secret))
    }

    /// Internal storage key for an identifier. Never exposed externally.
    pub fn storage_key_for(&self, blob_id: &str) -> String {
        sha1_hex(&format!("{}:file:{}", blob_id, self.secret))
    }
}

fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_known_content() {
        assert_eq!(
            compute_digest(b"content"),
            "md5:9a0364b9e99bb480dd25e1f0284c8555"
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let keys = KeyDeriver::new("secret");
        let digest = compute_digest(b"content");
        let first = keys.blob_id_for(&digest);
        let second = keys.blob_id_for(&digest);
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
        assert_eq!(
            keys.storage_key_for(&first),
            keys.storage_key_for(&first)
        );
    }

    #[test]
    fn different_secrets_yield_different_ids() {
        let digest = compute_digest(b"content");
        let a = KeyDeriver::new("secret-a").blob_id_for(&digest);
        let b = KeyDeriver::new("secret-b").blob_id_for(&digest);
        assert_ne!(a, b);
    }

    #[test]
    fn storage_key_differs_from_blob_id() {
        let keys = KeyDeriver::new("secret");
        let blob_id = keys.blob_id_for(&compute_digest(b"content"));
        assert_ne!(keys.storage_key_for(&blob_id), blob_id);
    }

    #[test]
    fn shard_segments_take_suffixes() {
        let (first, second) = shard_segments("0123abcdef");
        assert_eq!(first, "ef");
        assert_eq!(second, "cdef");
    }

    #[test]
    fn digest_validation() {
        assert!(validate_digest(&format!("md5:{}", "0".repeat(32))).is_ok());
        assert!(matches!(
            validate_digest("no-colon"),
            Err(OpalError::InvalidRequest(msg)) if msg == "Hash type is not supported."
        ));
        assert!(matches!(
            validate_digest("sha256:0000"),
            Err(OpalError::InvalidRequest(msg)) if msg == "Hash type is not supported."
        ));
        assert!(matches!(
            validate_digest("md5:abcd"),
            Err(OpalError::InvalidRequest(msg)) if msg == "Hash value is wrong length."
        ));
        assert!(matches!(
            validate_digest(&format!("md5:{}", "o".repeat(32))),
            Err(OpalError::InvalidRequest(msg)) if msg == "Hash value is not hexadecimal."
        ));
    }
}
