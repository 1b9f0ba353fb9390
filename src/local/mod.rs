//! Local storage capability
//!
//! Where downloaded bytes land and where uploaded bytes come from. The engine
//! only sees [`LocalStorage`]; [`FsLocalStorage`] is the directory-backed
//! implementation.

pub mod fs;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

pub use fs::FsLocalStorage;

/// Byte stream reading a local resource
pub type LocalReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink writing a local object
pub type LocalWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Error, Debug)]
pub enum LocalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Unsupported resource address: {0}")]
    UnsupportedAddress(String),
}

/// A user-selected local resource, addressed by path or `file://` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalResource {
    pub address: String,
}

impl LocalResource {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Local filesystem path behind the address, if it has one
    pub fn to_path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.address.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        if self.address.contains("://") {
            return None;
        }
        Some(PathBuf::from(&self.address))
    }
}

/// A locally addressable object produced by a download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalHandle {
    pub path: PathBuf,
    pub display_name: String,
}

impl LocalHandle {
    pub fn uri(&self) -> String {
        format!("file://{}", self.path.to_string_lossy())
    }
}

/// A freshly created local object and the sink for its contents
pub struct LocalTarget {
    pub handle: LocalHandle,
    pub writer: LocalWriter,
}

#[async_trait]
pub trait LocalStorage: Send + Sync {
    /// Create (or replace) a private object for "open" downloads
    async fn create_temp(&self, name: &str) -> Result<LocalTarget, LocalError>;

    /// Create a new user-visible object; never overwrites an existing one
    async fn create_public(
        &self,
        name: &str,
        subfolder: Option<&str>,
    ) -> Result<LocalTarget, LocalError>;

    async fn open_input(&self, resource: &LocalResource) -> Result<LocalReader, LocalError>;

    /// Display name from metadata, `None` when metadata is unavailable
    async fn display_name(&self, resource: &LocalResource) -> Option<String>;
}
