//! Connection Manager

use tracing::{info, warn};

use super::error::SessionError;
use super::operation::{OperationHandle, OperationKind};
use super::sequencer::RequestClass;
use super::types::{ConnectionStatus, Credentials, SessionState};
use super::SessionEngine;

impl SessionEngine {
    /// Connect with the credentials currently held in the snapshot.
    ///
    /// The status flips to `Connecting` before this returns. Only the latest
    /// connect request may write its outcome; older ones resolve to
    /// [`SessionError::Superseded`].
    pub fn connect(&self) -> OperationHandle<ConnectionStatus> {
        let epoch = self.session_epoch();
        let sequencer = &self.inner.sequencer;
        let mut token = 0;
        let mut credentials = Credentials::default();
        self.inner.store.update(|s| {
            token = sequencer.next(RequestClass::Connect);
            s.connection_status = ConnectionStatus::Connecting;
            credentials = s.credentials.clone();
        });

        let op = self.inner.operations.start(OperationKind::Connect);
        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control.run(engine.open_root(&credentials)).await;
            engine.commit_connect(token, epoch, result)
        })
    }

    /// Replace the credentials, then connect
    pub fn connect_with(&self, credentials: Credentials) -> OperationHandle<ConnectionStatus> {
        self.set_credentials(credentials);
        self.connect()
    }

    /// Back to `Idle`; everything else is left as is
    pub fn reset_status(&self) {
        self.inner
            .store
            .update(|s| s.connection_status = ConnectionStatus::Idle);
    }

    /// Cancel everything in flight and drop the session, keeping the credentials
    pub fn disconnect(&self) {
        info!("Disconnecting session");
        self.inner.operations.cancel_all();
        self.inner.sequencer.invalidate_all();
        self.inner
            .store
            .update(|s| *s = SessionState::new(s.credentials.clone()));
    }

    /// Open the share root and check that it exists, within the connect timeout
    async fn open_root(&self, credentials: &Credentials) -> Result<String, SessionError> {
        let config = &self.inner.config;
        let root_url = credentials.root_url(&config.scheme);
        let auth = credentials.authenticator();
        if auth.is_none() {
            warn!("Credentials incomplete, attempting anonymous access to {}", root_url);
        }
        info!("Connecting to {}", root_url);

        let attempt = async {
            let fs = self
                .inner
                .provider
                .open_session(&root_url, auth.as_ref())
                .await?;
            fs.exists(&root_url).await
        };

        match tokio::time::timeout(config.connect_timeout(), attempt).await {
            Err(_) => Err(SessionError::ConnectionTimeout {
                secs: config.connect_timeout_secs,
            }),
            Ok(Err(e)) => Err(SessionError::ConnectionFailed(e.to_string())),
            Ok(Ok(false)) => Err(SessionError::ShareNotFound),
            Ok(Ok(true)) => Ok(root_url),
        }
    }

    fn commit_connect(
        &self,
        token: u64,
        epoch: u64,
        result: Result<String, SessionError>,
    ) -> Result<ConnectionStatus, SessionError> {
        let status = match &result {
            Ok(root_path) => ConnectionStatus::Connected {
                root_path: root_path.clone(),
            },
            Err(e) => ConnectionStatus::Failed {
                reason: e.to_string(),
            },
        };

        let sequencer = &self.inner.sequencer;
        let committed = self.commit(epoch, |s| {
            if !sequencer.is_current(RequestClass::Connect, token) {
                return false;
            }
            if let Ok(root_path) = &result {
                s.root_path = Some(root_path.clone());
            }
            s.connection_status = status.clone();
            true
        });

        if !committed {
            warn!("Discarding superseded connect result: {:?}", status);
            return Err(SessionError::Superseded);
        }
        match result {
            Ok(root_path) => {
                info!("Connected to {}", root_path);
                Ok(status)
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_connect_success() {
        let fx = fixture();
        let status = fx.engine.connect().join().await.unwrap();
        assert_eq!(
            status,
            ConnectionStatus::Connected {
                root_path: ROOT.into()
            }
        );

        let state = fx.engine.snapshot();
        assert_eq!(state.connection_status, status);
        assert_eq!(state.root_path.as_deref(), Some(ROOT));
    }

    #[tokio::test]
    async fn test_connect_marks_connecting_immediately() {
        let fx = fixture();
        let handle = fx.engine.connect();
        assert_eq!(fx.engine.snapshot().connection_status, ConnectionStatus::Connecting);
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_connect_converges() {
        let fx = fixture();
        for _ in 0..3 {
            fx.engine.connect().join().await.unwrap();
        }
        assert!(matches!(
            fx.engine.snapshot().connection_status,
            ConnectionStatus::Connected { .. }
        ));
    }

    #[tokio::test]
    async fn test_share_not_found() {
        let fx = fixture();
        fx.engine.set_share("missing");

        let err = fx.engine.connect().join().await.unwrap_err();
        assert_eq!(err, SessionError::ShareNotFound);
        assert_eq!(
            fx.engine.snapshot().connection_status,
            ConnectionStatus::Failed {
                reason: "Share not found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_wrong_credentials_fail() {
        let fx = fixture();
        fx.remote.require_credentials("alice", "right");
        fx.engine.set_password("wrong");

        for _ in 0..2 {
            let err = fx.engine.connect().join().await.unwrap_err();
            assert!(matches!(err, SessionError::ConnectionFailed(_)));
        }
        assert!(matches!(
            fx.engine.snapshot().connection_status,
            ConnectionStatus::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_incomplete_credentials_try_anonymous() {
        let fx = fixture();
        fx.engine.set_user("");
        fx.engine.connect().join().await.unwrap();

        fx.remote.require_credentials("alice", "secret");
        let err = fx.engine.connect().join().await.unwrap_err();
        assert!(err.to_string().contains("Anonymous access denied"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_host_times_out() {
        let fx = fixture();
        fx.remote.set_unreachable("nas");

        let started = tokio::time::Instant::now();
        let err = fx.engine.connect().join().await.unwrap_err();
        assert_eq!(err, SessionError::ConnectionTimeout { secs: 10 });
        assert!(started.elapsed() <= std::time::Duration::from_secs(11));
        assert!(matches!(
            fx.engine.snapshot().connection_status,
            ConnectionStatus::Failed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_connect_does_not_overwrite() {
        let fx = fixture();
        fx.remote.set_unreachable("slow");

        fx.engine.set_host("slow");
        let stale = fx.engine.connect();
        fx.engine.set_host("nas");
        let fresh = fx.engine.connect();

        fresh.join().await.unwrap();
        assert_eq!(stale.join().await.unwrap_err(), SessionError::Superseded);
        assert_eq!(
            fx.engine.snapshot().connection_status,
            ConnectionStatus::Connected {
                root_path: ROOT.into()
            }
        );
    }

    #[tokio::test]
    async fn test_reset_status_only_touches_status() {
        let fx = fixture();
        fx.engine.connect().join().await.unwrap();
        fx.engine.reset_status();

        let state = fx.engine.snapshot();
        assert_eq!(state.connection_status, ConnectionStatus::Idle);
        assert_eq!(state.root_path.as_deref(), Some(ROOT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_and_resets() {
        let fx = fixture();
        fx.remote.set_unreachable("nas");
        let pending = fx.engine.connect();

        fx.engine.disconnect();
        assert_eq!(pending.join().await.unwrap_err(), SessionError::Superseded);

        let state = fx.engine.snapshot();
        assert_eq!(state.connection_status, ConnectionStatus::Idle);
        assert_eq!(state.credentials.user, "alice");
        assert_eq!(fx.engine.in_flight(), 0);
    }
}
