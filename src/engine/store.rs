//! Session State Store
//!
//! The snapshot lives in a `watch` channel. Every write runs as a closure under
//! the channel's lock, so a read-modify-write cycle can never interleave with
//! another one. Observers get whole snapshots only.

use tokio::sync::watch;

use super::types::SessionState;

pub struct SessionStore {
    tx: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(initial: SessionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Clone of the current snapshot
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Receiver notified after every applied update
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn update(&self, modify: impl FnOnce(&mut SessionState)) {
        self.tx.send_modify(modify);
    }

    /// Apply `modify`; observers are only notified when it returns true.
    ///
    /// A closure returning false must leave the state untouched.
    pub fn update_if(&self, modify: impl FnOnce(&mut SessionState) -> bool) -> bool {
        self.tx.send_if_modified(modify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_notifies_subscribers() {
        let store = SessionStore::new(SessionState::default());
        let mut rx = store.subscribe();

        store.update(|s| s.status_message = "3 items".into());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status_message, "3 items");
        assert_eq!(store.snapshot().status_message, "3 items");
    }

    #[tokio::test]
    async fn test_rejected_update_is_silent() {
        let store = SessionStore::new(SessionState::default());
        let rx = store.subscribe();

        assert!(!store.update_if(|_| false));
        assert!(!rx.has_changed().unwrap());

        assert!(store.update_if(|s| {
            s.is_listing = true;
            true
        }));
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_updates_without_subscribers_still_apply() {
        let store = SessionStore::new(SessionState::default());
        store.update(|s| s.is_listing = true);
        assert!(store.snapshot().is_listing);
    }
}
