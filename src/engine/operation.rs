//! Operation control
//!
//! Every engine operation runs as its own tokio task with a cancellation
//! signal registered under the operation id.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Connect,
    List,
    OpenFile,
    PublicDownload,
    Upload,
    CreateFolder,
    Rename,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Connect => "connect",
            OperationKind::List => "list",
            OperationKind::OpenFile => "open-file",
            OperationKind::PublicDownload => "public-download",
            OperationKind::Upload => "upload",
            OperationKind::CreateFolder => "create-folder",
            OperationKind::Rename => "rename",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Cancellation signal for one operation
#[derive(Debug)]
pub struct OperationControl {
    kind: OperationKind,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl OperationControl {
    pub fn new(kind: OperationKind) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            kind,
            cancel_tx,
            cancel_rx,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut cancel_rx = self.cancel_rx.clone();
        loop {
            let cancelled = *cancel_rx.borrow_and_update();
            if cancelled {
                return;
            }
            if cancel_rx.changed().await.is_err() {
                // Sender lives in self; unreachable while we are borrowed
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `work` until it finishes or the operation is cancelled
    pub async fn run<T>(
        &self,
        work: impl Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(SessionError::Cancelled),
            result = work => result,
        }
    }
}

/// Registry of in-flight operations
#[derive(Default)]
pub struct OperationRegistry {
    controls: RwLock<HashMap<String, Arc<OperationControl>>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new operation and get its id, control and guard
    pub fn start(self: &Arc<Self>, kind: OperationKind) -> PendingOperation {
        let id = Uuid::new_v4().to_string();
        let control = Arc::new(OperationControl::new(kind));
        self.controls.write().insert(id.clone(), control.clone());
        debug!("Registered {} operation: {}", kind, id);
        PendingOperation {
            guard: OperationGuard {
                registry: self.clone(),
                id: id.clone(),
            },
            id,
            control,
        }
    }

    pub fn unregister(&self, id: &str) {
        self.controls.write().remove(id);
        debug!("Unregistered operation: {}", id);
    }

    pub fn cancel(&self, id: &str) -> bool {
        if let Some(control) = self.controls.read().get(id) {
            control.cancel();
            info!("Cancelled {} operation: {}", control.kind(), id);
            true
        } else {
            warn!("Operation not found for cancel: {}", id);
            false
        }
    }

    pub fn cancel_all(&self) {
        let controls = self.controls.read();
        for (id, control) in controls.iter() {
            control.cancel();
            info!("Cancelled {} operation: {}", control.kind(), id);
        }
    }

    pub fn registered_count(&self) -> usize {
        self.controls.read().len()
    }
}

/// Unregisters the operation on drop, whichever way its task ends
pub struct OperationGuard {
    registry: Arc<OperationRegistry>,
    id: String,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

/// A registered operation whose task has not been spawned yet
pub struct PendingOperation {
    id: String,
    control: Arc<OperationControl>,
    guard: OperationGuard,
}

impl PendingOperation {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn control(&self) -> Arc<OperationControl> {
        self.control.clone()
    }

    pub fn spawn<T, F>(self, work: F) -> OperationHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, SessionError>> + Send + 'static,
    {
        let guard = self.guard;
        let join = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });
        OperationHandle {
            id: self.id,
            control: self.control,
            join,
        }
    }

    /// Resolve immediately with `err`
    pub fn fail<T: Send + 'static>(self, err: SessionError) -> OperationHandle<T> {
        self.spawn(async move { Err(err) })
    }
}

/// Caller's handle on a running operation
pub struct OperationHandle<T> {
    id: String,
    control: Arc<OperationControl>,
    join: JoinHandle<Result<T, SessionError>>,
}

impl<T> OperationHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.control.kind()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the outcome
    pub async fn join(self) -> Result<T, SessionError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(SessionError::Cancelled),
            Err(e) => Err(SessionError::TaskFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_unregisters_on_completion() {
        let registry = Arc::new(OperationRegistry::new());
        let op = registry.start(OperationKind::List);
        assert_eq!(registry.registered_count(), 1);

        let handle = op.spawn(async { Ok::<_, SessionError>(7) });
        assert_eq!(handle.join().await.unwrap(), 7);
        assert_eq!(registry.registered_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let registry = Arc::new(OperationRegistry::new());
        let op = registry.start(OperationKind::Upload);
        let control = op.control();
        let id = op.id().to_string();

        let handle = op.spawn(async move {
            control
                .run(async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                })
                .await
        });

        assert!(registry.cancel(&id));
        assert_eq!(handle.join().await.unwrap_err(), SessionError::Cancelled);
        assert!(!registry.cancel(&id));
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let registry = Arc::new(OperationRegistry::new());
        let a = registry.start(OperationKind::Connect);
        let b = registry.start(OperationKind::Delete);
        let (ca, cb) = (a.control(), b.control());

        registry.cancel_all();
        assert!(ca.is_cancelled());
        assert!(cb.is_cancelled());
    }

    #[tokio::test]
    async fn test_fail_resolves_immediately() {
        let registry = Arc::new(OperationRegistry::new());
        let handle: OperationHandle<()> =
            registry.start(OperationKind::Upload).fail(SessionError::TransferBusy);
        assert_eq!(handle.join().await.unwrap_err(), SessionError::TransferBusy);
    }
}
