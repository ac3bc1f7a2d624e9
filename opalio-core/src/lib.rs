//! Opalio Core - content-addressed blob storage for document services
//!
//! A filesystem-backed blob store using:
//! - secret-keyed identifier/storage-key derivation
//! - two-level suffix-sharded directories
//! - write-temp-then-rename atomic publish
//! - extension/media-type/archive content filtering
//! - optional push replication to peer stores

pub mod addressing;
pub mod config;
pub mod dangerous;
pub mod error;
pub mod filter;
pub mod operations;
pub mod replica;
pub mod storage;

pub use addressing::{KeyDeriver, compute_digest, shard_segments, validate_digest};
pub use config::{Disposition, EMPTY_FILE_DIGEST, ForbiddenSets, StoreConfig};
pub use error::{OpalError, Result};
pub use filter::ContentFilter;
pub use operations::{
    ReadBlobOperation, ReadBlobOperationRequest, ReadBlobOperationResult, RegisterBlobOperation,
    RegisterBlobOperationRequest, RegisterBlobOperationResult, UploadBlobOperation,
    UploadBlobOperationRequest, UploadBlobOperationResult,
};
pub use replica::{ReplicaClient, ReplicaEndpoint};
pub use storage::blob_store::BlobStore;
pub use storage::metadata_store::{AlternativeName, BlobMeta, MetadataStore};
