//! Directory Lister

use tracing::{debug, warn};

use super::error::SessionError;
use super::operation::{OperationHandle, OperationKind};
use super::sequencer::RequestClass;
use super::types::RemoteEntry;
use super::SessionEngine;

/// Status text for a completed listing
pub fn item_count_message(count: usize) -> String {
    if count == 1 {
        "1 item".to_string()
    } else {
        format!("{} items", count)
    }
}

/// Directories first; server order is kept within each group
pub fn order_entries(entries: &mut [RemoteEntry]) {
    entries.sort_by(|a, b| b.is_directory.cmp(&a.is_directory));
}

impl SessionEngine {
    /// List `path` and make it the current directory.
    ///
    /// On failure the previous entries stay in place.
    pub fn list(&self, path: &str) -> OperationHandle<Vec<RemoteEntry>> {
        let path = path.to_string();
        let epoch = self.session_epoch();
        let token = self.begin_listing(&path);

        let op = self.inner.operations.start(OperationKind::List);
        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control.run(engine.fetch_entries(&path)).await;
            engine.commit_listing(token, epoch, result)
        })
    }

    /// Re-list `path` after a mutation; runs inside the caller's task
    pub(crate) async fn refresh_listing(&self, path: &str, epoch: u64) {
        let token = self.begin_listing(path);
        let result = self.fetch_entries(path).await;
        if let Err(e) = self.commit_listing(token, epoch, result) {
            debug!("Refresh of {} did not apply: {}", path, e);
        }
    }

    /// The token is issued under the store lock so token order matches the
    /// order of `current_path` writes
    fn begin_listing(&self, path: &str) -> u64 {
        let sequencer = &self.inner.sequencer;
        let mut token = 0;
        self.inner.store.update(|s| {
            token = sequencer.next(RequestClass::List);
            s.is_listing = true;
            s.current_path = Some(path.to_string());
            s.status_message = "Loading...".to_string();
        });
        token
    }

    async fn fetch_entries(&self, path: &str) -> Result<Vec<RemoteEntry>, SessionError> {
        let fs = self.open_fs().await?;
        let is_dir = fs
            .is_directory(path)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::ListingFailed))?;
        if !is_dir {
            return Err(SessionError::NotADirectory(path.to_string()));
        }

        let objects = fs
            .list(path)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::ListingFailed))?;
        let mut entries: Vec<RemoteEntry> = objects.into_iter().map(RemoteEntry::from).collect();
        order_entries(&mut entries);
        debug!("Listed {} entries in {}", entries.len(), path);
        Ok(entries)
    }

    fn commit_listing(
        &self,
        token: u64,
        epoch: u64,
        result: Result<Vec<RemoteEntry>, SessionError>,
    ) -> Result<Vec<RemoteEntry>, SessionError> {
        let sequencer = &self.inner.sequencer;
        let committed = self.commit(epoch, |s| {
            if !sequencer.is_current(RequestClass::List, token) {
                return false;
            }
            s.is_listing = false;
            match &result {
                Ok(entries) => {
                    s.entries = entries.clone();
                    s.status_message = item_count_message(entries.len());
                }
                Err(e) => s.status_message = e.to_string(),
            }
            true
        });

        if !committed {
            warn!("Discarding superseded listing (token {})", token);
            return Err(SessionError::Superseded);
        }
        if let Err(e) = &result {
            warn!("Listing failed: {}", e);
        }
        result
    }
}
