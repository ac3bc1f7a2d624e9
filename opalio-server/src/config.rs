use opalio_core::{Disposition, ForbiddenSets, OpalError, Result, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Base of the URLs returned to clients (and parsed back by replica
    /// primaries pushing to this instance).
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Lifetime in seconds stamped on returned get URLs; the signed-URL
    /// layer in front of delivery enforces it.
    #[serde(default = "default_get_url_expire")]
    pub get_url_expire: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: default_public_url(),
            get_url_expire: default_get_url_expire(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    pub save_path: PathBuf,
    #[serde(default = "default_web_root")]
    pub web_root: String,
    pub secret_key: String,
    #[serde(default)]
    pub disposition: Disposition,
    /// Comma-separated extension list replacing the built-in one.
    #[serde(default)]
    pub forbidden_ext: Option<String>,
    /// Path to a media-type list file replacing the built-in list.
    #[serde(default)]
    pub forbidden_mime: Option<PathBuf>,
    /// Path to a digest list file replacing the built-in list.
    #[serde(default)]
    pub forbidden_hash: Option<PathBuf>,
    #[serde(default)]
    pub replica_api: Vec<String>,
    #[serde(default = "default_require_replica_upload")]
    pub require_replica_upload: bool,
    #[serde(default = "default_replica_timeout")]
    pub replica_timeout: u64,
    #[serde(default = "default_replica_max_retry")]
    pub replica_max_retry: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:6290".to_string()
}

fn default_public_url() -> String {
    "http://localhost:6290".to_string()
}

fn default_get_url_expire() -> u64 {
    300
}

fn default_web_root() -> String {
    "/files".to_string()
}

fn default_require_replica_upload() -> bool {
    true
}

fn default_replica_timeout() -> u64 {
    opalio_core::config::DEFAULT_REPLICA_TIMEOUT_SECS
}

fn default_replica_max_retry() -> u32 {
    opalio_core::config::DEFAULT_REPLICA_MAX_RETRY
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("OPALIO"))
            .build()
            .map_err(|e| OpalError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| OpalError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Resolve the engine configuration, loading blocklist overrides.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut forbidden = ForbiddenSets::default();
        if let Some(csv) = &self.files.forbidden_ext {
            forbidden.set_extensions_csv(csv);
        }
        if let Some(path) = &self.files.forbidden_mime {
            forbidden.load_media_types(path)?;
        }
        if let Some(path) = &self.files.forbidden_hash {
            forbidden.load_digests(path)?;
        }

        let mut store = StoreConfig::new(
            self.files.save_path.clone(),
            self.files.web_root.clone(),
            self.files.secret_key.clone(),
        );
        store.disposition = self.files.disposition;
        store.forbidden = forbidden;
        store.replica_endpoints = self.files.replica_api.clone();
        store.require_replica_upload = self.files.require_replica_upload;
        store.replica_timeout_secs = self.files.replica_timeout;
        store.replica_max_retry = self.files.replica_max_retry;
        Ok(store)
    }
}
