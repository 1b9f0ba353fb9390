//! Remote session engine
//!
//! [`SessionEngine`] is the façade handed to UI collaborators. Each operation
//! is spawned on the tokio runtime and returns an [`OperationHandle`]; its
//! outcome is also written into the [`SessionState`] snapshot, which is the
//! only thing observers need to watch.
//!
//! The operations are split by concern:
//! - [`connection`]: connect, reset, disconnect
//! - [`listing`]: directory listing and refresh
//! - [`transfer`]: open-file downloads, public downloads, uploads
//! - [`mutation`]: create folder, rename, recursive delete

pub mod connection;
pub mod error;
pub mod listing;
pub mod mutation;
pub mod operation;
pub mod sequencer;
pub mod store;
pub mod transfer;
pub mod types;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::config::EngineConfig;
use crate::local::LocalStorage;
use crate::remote::{RemoteFs, RemoteFsProvider};

pub use error::SessionError;
pub use operation::{OperationHandle, OperationKind};
pub use transfer::ProgressThrottle;
pub use types::{
    ActiveTransfer, ConnectionStatus, Credentials, RemoteEntry, SessionState, TransferDirection,
};

use operation::OperationRegistry;
use sequencer::{RequestClass, RequestSequencer};
use store::SessionStore;

struct EngineInner {
    config: EngineConfig,
    provider: Arc<dyn RemoteFsProvider>,
    local: Arc<dyn LocalStorage>,
    store: SessionStore,
    sequencer: RequestSequencer,
    operations: Arc<OperationRegistry>,
}

/// Session engine; cheap to clone, all clones share one session
#[derive(Clone)]
pub struct SessionEngine {
    inner: Arc<EngineInner>,
}

impl SessionEngine {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn RemoteFsProvider>,
        local: Arc<dyn LocalStorage>,
    ) -> Self {
        let credentials = Credentials::new(&config.default_host, &config.default_share);
        Self {
            inner: Arc::new(EngineInner {
                store: SessionStore::new(SessionState::new(credentials)),
                sequencer: RequestSequencer::new(),
                operations: Arc::new(OperationRegistry::new()),
                config,
                provider,
                local,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.store.subscribe()
    }

    /// Number of operations whose tasks have not finished
    pub fn in_flight(&self) -> usize {
        self.inner.operations.registered_count()
    }

    pub fn set_host(&self, host: impl Into<String>) {
        let host = host.into();
        self.inner.store.update(|s| s.credentials.host = host);
    }

    pub fn set_share(&self, share: impl Into<String>) {
        let share = share.into();
        self.inner.store.update(|s| s.credentials.share = share);
    }

    pub fn set_user(&self, user: impl Into<String>) {
        let user = user.into();
        self.inner.store.update(|s| s.credentials.user = user);
    }

    pub fn set_password(&self, password: impl Into<String>) {
        let password = password.into();
        self.inner.store.update(|s| s.credentials.password = password);
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        self.inner.store.update(|s| s.credentials = credentials);
    }

    /// Token of the current session generation, captured when an operation is issued
    fn session_epoch(&self) -> u64 {
        self.inner.sequencer.current(RequestClass::Session)
    }

    /// Apply `modify` unless the session was torn down since `epoch`
    fn commit(&self, epoch: u64, modify: impl FnOnce(&mut SessionState) -> bool) -> bool {
        let sequencer = &self.inner.sequencer;
        self.inner.store.update_if(|state| {
            if !sequencer.is_current(RequestClass::Session, epoch) {
                return false;
            }
            modify(state)
        })
    }

    /// Write a status message for an operation issued in `epoch`
    fn report(&self, epoch: u64, message: String) {
        self.commit(epoch, |s| {
            s.status_message = message;
            true
        });
    }

    /// Open a fresh authenticated session for one operation
    async fn open_fs(&self) -> Result<Arc<dyn RemoteFs>, SessionError> {
        let credentials = self.inner.store.snapshot().credentials;
        let auth = credentials
            .authenticator()
            .ok_or_else(|| SessionError::SessionLost("credentials are incomplete".into()))?;
        let root_url = credentials.root_url(&self.inner.config.scheme);
        debug!("Opening session for {}", root_url);
        self.inner
            .provider
            .open_session(&root_url, Some(&auth))
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::ConnectionFailed))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_fresh_engine_uses_config_defaults() {
        let engine = SessionEngine::new(
            EngineConfig::default(),
            Arc::new(crate::remote::MemoryRemote::new()),
            Arc::new(crate::local::FsLocalStorage::new("/tmp/c", "/tmp/d")),
        );
        let state = engine.snapshot();
        assert_eq!(state.credentials.host, "localhost");
        assert_eq!(state.credentials.share, "public");
        assert_eq!(state.connection_status, ConnectionStatus::Idle);
        assert!(state.entries.is_empty());
    }

    #[tokio::test]
    async fn test_credential_setters() {
        let fx = fixture();
        let mut rx = fx.engine.subscribe();

        fx.engine.set_host("10.0.2.2");
        fx.engine.set_share("Public");
        fx.engine.set_user("bob");
        fx.engine.set_password("pw");

        rx.changed().await.unwrap();
        let creds = rx.borrow_and_update().credentials.clone();
        assert_eq!(creds.host, "10.0.2.2");
        assert_eq!(creds.share, "Public");
        assert_eq!(creds.user, "bob");
        assert_eq!(creds.password, "pw");
    }

    #[tokio::test]
    async fn test_operations_require_usable_credentials() {
        let fx = fixture();
        fx.share.mkdir_all("Music");
        fx.engine.set_password("");

        let err = fx.engine.list(ROOT).join().await.unwrap_err();
        assert!(matches!(err, SessionError::SessionLost(_)));
        let state = fx.engine.snapshot();
        assert!(!state.is_listing);
        assert_eq!(state.status_message, err.to_string());
    }
}
