//! Remote filesystem capability
//!
//! The engine never speaks a wire protocol itself. It drives a [`RemoteFs`]
//! obtained from a [`RemoteFsProvider`] for a share root URL and an optional
//! [`Authenticator`]. Paths passed to every method are full share URLs.

pub mod error;
pub mod memory;
pub mod mounted;
pub mod path_utils;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

pub use error::RemoteError;
pub use memory::{MemoryRemote, MemoryShare};
pub use mounted::MountedShareProvider;

/// Byte stream reading a remote object
pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink writing a remote object
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Username/password pair presented to the server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    /// Optional NT domain; `None` lets the server pick
    pub domain: Option<String>,
    pub username: String,
    pub password: String,
}

impl Authenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            domain: None,
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One child as reported by the server
///
/// `name` is passed through verbatim; servers commonly append `/` to
/// directory names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
}

/// Operations available on an authenticated share session
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError>;

    async fn is_directory(&self, path: &str) -> Result<bool, RemoteError>;

    /// Direct children, in server order
    async fn list(&self, path: &str) -> Result<Vec<RemoteObject>, RemoteError>;

    async fn open_read(&self, path: &str) -> Result<RemoteReader, RemoteError>;

    /// Create or truncate a file and return a sink for its contents
    async fn open_write(&self, path: &str) -> Result<RemoteWriter, RemoteError>;

    async fn mkdir(&self, path: &str) -> Result<(), RemoteError>;

    /// Delete a file or an empty directory
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), RemoteError>;

    /// Size in bytes; 0 when the server does not know
    async fn length(&self, path: &str) -> Result<u64, RemoteError>;
}

/// Opens share sessions
#[async_trait]
pub trait RemoteFsProvider: Send + Sync {
    /// Open a session rooted at `root_url`. `auth == None` attempts anonymous access.
    async fn open_session(
        &self,
        root_url: &str,
        auth: Option<&Authenticator>,
    ) -> Result<Arc<dyn RemoteFs>, RemoteError>;
}
