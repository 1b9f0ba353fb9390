//! SMBridge - remote share session engine
//!
//! Connects to a remote file share (host + share + credentials), browses it,
//! streams files in both directions and mutates the remote tree. Every operation
//! runs on the tokio runtime and publishes its outcome through a single
//! observable [`SessionState`](engine::SessionState) snapshot.

pub mod config;
pub mod engine;
pub mod local;
pub mod remote;

pub use config::{ConfigStorage, EngineConfig};
pub use engine::{
    ConnectionStatus, Credentials, OperationHandle, RemoteEntry, SessionEngine, SessionError,
    SessionState,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging
///
/// Honors `RUST_LOG`; falls back to `info`. Returns false when a global
/// subscriber was already installed, leaving that one in place.
pub fn init_logging() -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_keeps_first_subscriber() {
        init_logging();
        assert!(!init_logging());
    }
}
