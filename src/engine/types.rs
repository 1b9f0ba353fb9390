//! Session data model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::local::LocalHandle;
use crate::remote::path_utils::{share_root_url, strip_trailing_separator};
use crate::remote::{Authenticator, RemoteObject};

/// Host, share and login fields as entered by the user
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub host: String,
    pub share: String,
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(host: impl Into<String>, share: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            share: share.into(),
            ..Default::default()
        }
    }

    pub fn with_login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Both user and password are filled in; whitespace does not count
    pub fn usable(&self) -> bool {
        !self.user.trim().is_empty() && !self.password.trim().is_empty()
    }

    /// `None` when the credentials are incomplete
    pub fn authenticator(&self) -> Option<Authenticator> {
        self.usable()
            .then(|| Authenticator::new(self.user.clone(), self.password.clone()))
    }

    pub fn root_url(&self, scheme: &str) -> String {
        share_root_url(scheme, &self.host, &self.share)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("share", &self.share)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One listed child, frozen at listing time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// Server-qualified URL
    pub path: String,
    /// Display name without trailing separator
    pub name: String,
    pub is_directory: bool,
}

impl From<RemoteObject> for RemoteEntry {
    fn from(obj: RemoteObject) -> Self {
        Self {
            name: strip_trailing_separator(&obj.name).to_string(),
            path: obj.path,
            is_directory: obj.is_directory,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    #[serde(rename_all = "camelCase")]
    Connected { root_path: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Download,
    Upload,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Download => write!(f, "Download"),
            TransferDirection::Upload => write!(f, "Upload"),
        }
    }
}

/// The single in-flight transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTransfer {
    /// Id of the owning operation
    pub id: String,
    pub path: String,
    pub direction: TransferDirection,
    /// `None` while the size is unknown or progress is not tracked
    pub percent: Option<u8>,
}

/// Complete observable session snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub credentials: Credentials,
    pub connection_status: ConnectionStatus,
    pub root_path: Option<String>,
    pub current_path: Option<String>,
    pub entries: Vec<RemoteEntry>,
    pub is_listing: bool,
    pub status_message: String,
    pub active_transfer: Option<ActiveTransfer>,
    /// Downloaded object waiting to be handed to a viewer
    pub pending_open_target: Option<LocalHandle>,
}

impl SessionState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_usability() {
        let creds = Credentials::new("nas", "media");
        assert!(!creds.usable());
        assert!(creds.authenticator().is_none());

        let creds = creds.with_login("alice", "");
        assert!(!creds.usable());

        let creds = creds.with_login("  ", "secret");
        assert!(!creds.usable());
        let creds = creds.with_login("alice", "\t ");
        assert!(creds.authenticator().is_none());

        let creds = creds.with_login("alice", "secret");
        let auth = creds.authenticator().unwrap();
        assert_eq!(auth.username, "alice");
        assert_eq!(creds.root_url("smb"), "smb://nas/media/");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("nas", "media").with_login("alice", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_entry_strips_separator() {
        let entry = RemoteEntry::from(RemoteObject {
            path: "smb://nas/media/Music/".into(),
            name: "Music/".into(),
            is_directory: true,
        });
        assert_eq!(entry.name, "Music");
        assert_eq!(entry.path, "smb://nas/media/Music/");
    }

    #[test]
    fn test_connection_status_serializes_tagged() {
        let json = serde_json::to_string(&ConnectionStatus::Connected {
            root_path: "smb://nas/media/".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"connected","rootPath":"smb://nas/media/"}"#);
    }
}
