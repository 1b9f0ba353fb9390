//! Remote filesystem error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Invalid share path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Whether the session behind this error should be treated as gone
    pub fn is_session_loss(&self) -> bool {
        matches!(self, RemoteError::AuthFailed(_) | RemoteError::Disconnected(_))
    }

    /// Classify a local IO error raised while serving `path`
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => RemoteError::NotFound(path.to_string()),
            ErrorKind::AlreadyExists => RemoteError::AlreadyExists(path.to_string()),
            ErrorKind::PermissionDenied => RemoteError::PermissionDenied(path.to_string()),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                RemoteError::Disconnected(err.to_string())
            }
            _ => RemoteError::Io(err),
        }
    }
}
