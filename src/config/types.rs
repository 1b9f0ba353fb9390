//! Engine configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Current on-disk config version
pub const CONFIG_VERSION: u32 = 1;

/// Tunables for [`SessionEngine`](crate::engine::SessionEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Config file format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// URL scheme used to build the share root (`scheme://host/share/`)
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Host pre-filled into fresh credentials
    #[serde(default = "default_host")]
    pub default_host: String,

    /// Share pre-filled into fresh credentials
    #[serde(default = "default_share")]
    pub default_share: String,

    /// Upper bound for a connection attempt, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read size for progress-tracked downloads
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Only percent values that are a multiple of this are published.
    /// 0 or 1 publishes every change.
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,

    /// Logical subfolder (below the download dir) for public downloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_subfolder: Option<String>,

    /// Where "open" downloads land. `None` resolves to the platform cache dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Where public downloads land. `None` resolves to the platform download dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_scheme() -> String {
    "smb".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_share() -> String {
    "public".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_chunk_size() -> usize {
    16 * 1024
}

fn default_progress_step() -> u8 {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            scheme: default_scheme(),
            default_host: default_host(),
            default_share: default_share(),
            connect_timeout_secs: default_connect_timeout(),
            chunk_size: default_chunk_size(),
            progress_step: default_progress_step(),
            public_subfolder: None,
            cache_dir: None,
            download_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Chunk size, never zero
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Resolve the cache directory for "open" downloads
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("smbridge")
        })
    }

    /// Resolve the user-visible download directory
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            dirs::download_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
                .unwrap_or_else(std::env::temp_dir)
        })
    }
}
