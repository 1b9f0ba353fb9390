//! Session error taxonomy
//!
//! Every variant renders as the status message written into the snapshot.

use thiserror::Error;

use super::types::TransferDirection;
use crate::remote::RemoteError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Connection timed out after {secs} seconds")]
    ConnectionTimeout { secs: u64 },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Share not found")]
    ShareNotFound,

    #[error("Session lost: {0}. Please reconnect.")]
    SessionLost(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Listing failed: {0}")]
    ListingFailed(String),

    #[error("{direction} failed: {cause}")]
    TransferFailed {
        direction: TransferDirection,
        cause: String,
    },

    #[error("Could not create destination: {0}")]
    DestinationCreateFailed(String),

    #[error("'{0}' already exists")]
    NameConflict(String),

    #[error("'{0}' no longer exists")]
    TargetMissing(String),

    #[error("Could not list '{path}' while deleting: {cause}")]
    RecursiveDeleteChildListingFailed { path: String, cause: String },

    #[error("{action} failed: {cause}")]
    MutationFailed { action: String, cause: String },

    #[error("Superseded by a newer request")]
    Superseded,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Another transfer is already in progress")]
    TransferBusy,

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl SessionError {
    /// Map a remote error, routing auth loss and disconnects to `SessionLost`
    pub fn from_remote(err: RemoteError, other: impl FnOnce(String) -> SessionError) -> Self {
        if err.is_session_loss() {
            SessionError::SessionLost(err.to_string())
        } else {
            other(err.to_string())
        }
    }

    pub fn transfer(direction: TransferDirection) -> impl FnOnce(String) -> SessionError {
        move |cause| SessionError::TransferFailed { direction, cause }
    }

    pub fn mutation(action: &str) -> impl FnOnce(String) -> SessionError + '_ {
        move |cause| SessionError::MutationFailed {
            action: action.to_string(),
            cause,
        }
    }
}

// Serialized as its status text
impl serde::Serialize for SessionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_loss_is_routed() {
        let err = SessionError::from_remote(
            RemoteError::Disconnected("reset".into()),
            SessionError::ListingFailed,
        );
        assert!(matches!(err, SessionError::SessionLost(_)));

        let err = SessionError::from_remote(
            RemoteError::PermissionDenied("x".into()),
            SessionError::ListingFailed,
        );
        assert!(matches!(err, SessionError::ListingFailed(_)));
    }

    #[test]
    fn test_status_text() {
        let err = SessionError::transfer(TransferDirection::Upload)("disk full".into());
        assert_eq!(err.to_string(), "Upload failed: disk full");
        assert_eq!(
            SessionError::NameConflict("Docs".into()).to_string(),
            "'Docs' already exists"
        );
    }
}
