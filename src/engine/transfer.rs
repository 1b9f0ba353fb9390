//! Transfer Engine
//!
//! At most one transfer occupies `activeTransfer`; it is claimed before the
//! task is spawned and released by the same operation id.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::operation::{OperationHandle, OperationKind};
use super::types::{ActiveTransfer, RemoteEntry, SessionState, TransferDirection};
use super::SessionEngine;
use crate::local::{LocalHandle, LocalResource, LocalWriter};
use crate::remote::path_utils::{
    ensure_trailing_separator, join_remote_path, last_segment, strip_trailing_separator,
};
use crate::remote::RemoteReader;

/// Publishes a percentage only when it changed and lands on a multiple of `step`
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    total: u64,
    step: u8,
    last: u8,
}

impl ProgressThrottle {
    pub fn new(total: u64, step: u8) -> Self {
        Self {
            total,
            step: step.max(1),
            last: 0,
        }
    }

    /// Whether percentages can be computed at all
    pub fn is_tracking(&self) -> bool {
        self.total > 0
    }

    /// Record the running byte count; returns the percent to publish, if any
    pub fn record(&mut self, transferred: u64) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let percent = (u128::from(transferred) * 100 / u128::from(self.total)).min(100) as u8;
        if percent == self.last {
            return None;
        }
        if percent % self.step != 0 && percent != 100 {
            return None;
        }
        self.last = percent;
        Some(percent)
    }
}

impl SessionEngine {
    /// Download `entry` into the private cache and hand it over as
    /// `pendingOpenTarget`
    pub fn open_file(&self, entry: &RemoteEntry) -> OperationHandle<LocalHandle> {
        let entry = entry.clone();
        let epoch = self.session_epoch();
        let op = self.inner.operations.start(OperationKind::OpenFile);
        let id = op.id().to_string();
        if !self.claim_transfer(&id, &entry.path, TransferDirection::Download, None) {
            return op.fail(SessionError::TransferBusy);
        }

        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control.run(engine.fetch_to_cache(&entry)).await;
            engine.finish_transfer(epoch, &id, |s| match &result {
                Ok(handle) => {
                    s.pending_open_target = Some(handle.clone());
                    s.status_message = format!("Opening '{}'...", entry.name);
                }
                Err(e) => s.status_message = e.to_string(),
            });
            result
        })
    }

    /// Download `entry` into the user-visible download location with progress
    pub fn download_to_public_storage(&self, entry: &RemoteEntry) -> OperationHandle<LocalHandle> {
        let entry = entry.clone();
        let epoch = self.session_epoch();
        let op = self.inner.operations.start(OperationKind::PublicDownload);
        let id = op.id().to_string();
        if !self.claim_transfer(
            &id,
            &entry.path,
            TransferDirection::Download,
            Some("Starting download...".to_string()),
        ) {
            return op.fail(SessionError::TransferBusy);
        }

        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control.run(engine.fetch_to_public(&entry, &id, epoch)).await;
            engine.finish_transfer(epoch, &id, |s| {
                s.status_message = match &result {
                    Ok(_) => format!("'{}' downloaded successfully.", entry.name),
                    Err(e) => e.to_string(),
                }
            });
            match &result {
                Ok(handle) => info!("Downloaded {} to {:?}", entry.path, handle.path),
                Err(e) => warn!("Download of {} failed: {}", entry.path, e),
            }
            result
        })
    }

    /// Copy a local resource into `destination` and refresh that directory.
    ///
    /// Resolves to the remote path written.
    pub fn upload(&self, resource: LocalResource, destination: &str) -> OperationHandle<String> {
        let directory = ensure_trailing_separator(strip_trailing_separator(destination));
        let epoch = self.session_epoch();
        let op = self.inner.operations.start(OperationKind::Upload);
        let id = op.id().to_string();
        if !self.claim_transfer(&id, &resource.address, TransferDirection::Upload, None) {
            return op.fail(SessionError::TransferBusy);
        }

        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control
                .run(engine.push_resource(&resource, &directory, epoch))
                .await;
            engine.finish_transfer(epoch, &id, |s| {
                s.status_message = match &result {
                    Ok(path) => format!("'{}' uploaded successfully.", last_segment(path)),
                    Err(e) => e.to_string(),
                }
            });
            match &result {
                Ok(path) => {
                    info!("Uploaded {} to {}", resource.address, path);
                    engine.refresh_listing(&directory, epoch).await;
                }
                Err(e) => warn!("Upload of {} failed: {}", resource.address, e),
            }
            result
        })
    }

    /// The collaborator has taken the pending open target
    pub fn acknowledge_opened_file(&self) {
        self.inner.store.update(|s| s.pending_open_target = None);
    }

    /// Cancel the active transfer, if any
    pub fn cancel_transfer(&self) -> bool {
        let active = self.inner.store.snapshot().active_transfer;
        match active {
            Some(transfer) => self.inner.operations.cancel(&transfer.id),
            None => false,
        }
    }

    fn claim_transfer(
        &self,
        id: &str,
        path: &str,
        direction: TransferDirection,
        status: Option<String>,
    ) -> bool {
        let claimed = self.inner.store.update_if(|s| {
            if s.active_transfer.is_some() {
                return false;
            }
            s.active_transfer = Some(ActiveTransfer {
                id: id.to_string(),
                path: path.to_string(),
                direction,
                percent: None,
            });
            if let Some(status) = status {
                s.status_message = status;
            }
            true
        });
        if !claimed {
            warn!("Transfer of {} rejected, another transfer is active", path);
        }
        claimed
    }

    /// Release `activeTransfer` if `id` still owns it, then apply `modify`
    fn finish_transfer(
        &self,
        epoch: u64,
        id: &str,
        modify: impl FnOnce(&mut SessionState),
    ) {
        self.commit(epoch, |s| {
            if s.active_transfer.as_ref().is_some_and(|t| t.id == id) {
                s.active_transfer = None;
            }
            modify(s);
            true
        });
    }

    fn publish_progress(&self, epoch: u64, id: &str, name: &str, percent: u8) {
        self.commit(epoch, |s| match s.active_transfer.as_mut() {
            Some(transfer) if transfer.id == id => {
                transfer.percent = Some(percent);
                s.status_message = format!("Downloading {}: {}%", name, percent);
                true
            }
            _ => false,
        });
    }

    async fn fetch_to_cache(&self, entry: &RemoteEntry) -> Result<LocalHandle, SessionError> {
        let failed = |cause: String| SessionError::TransferFailed {
            direction: TransferDirection::Download,
            cause,
        };
        let fs = self.open_fs().await?;
        let mut reader = fs
            .open_read(&entry.path)
            .await
            .map_err(|e| SessionError::from_remote(e, failed))?;

        let target = self
            .inner
            .local
            .create_temp(&entry.name)
            .await
            .map_err(|e| SessionError::DestinationCreateFailed(e.to_string()))?;
        let mut writer = target.writer;

        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| failed(e.to_string()))?;
        writer.shutdown().await.map_err(|e| failed(e.to_string()))?;

        debug!("Cached {} ({} bytes) at {:?}", entry.path, copied, target.handle.path);
        Ok(target.handle)
    }

    async fn fetch_to_public(
        &self,
        entry: &RemoteEntry,
        id: &str,
        epoch: u64,
    ) -> Result<LocalHandle, SessionError> {
        let failed = |cause: String| SessionError::TransferFailed {
            direction: TransferDirection::Download,
            cause,
        };
        let config = &self.inner.config;
        let fs = self.open_fs().await?;
        let total = fs
            .length(&entry.path)
            .await
            .map_err(|e| SessionError::from_remote(e, failed))?;

        let target = self
            .inner
            .local
            .create_public(&entry.name, config.public_subfolder.as_deref())
            .await
            .map_err(|e| SessionError::DestinationCreateFailed(e.to_string()))?;
        let mut writer = target.writer;

        let mut reader = fs
            .open_read(&entry.path)
            .await
            .map_err(|e| SessionError::from_remote(e, failed))?;

        let mut throttle = ProgressThrottle::new(total, config.progress_step);
        if !throttle.is_tracking() {
            debug!("Size of {} unknown, progress not reported", entry.path);
        }

        let copied = self
            .copy_chunks(&mut reader, &mut writer, &mut throttle, |percent| {
                self.publish_progress(epoch, id, &entry.name, percent)
            })
            .await;
        // Whatever was written stays on disk, even when the copy failed
        let closed = writer.shutdown().await;
        let transferred = copied.map_err(|e| failed(e.to_string()))?;
        closed.map_err(|e| failed(e.to_string()))?;

        debug!("Copied {} bytes of {}", transferred, entry.path);
        Ok(target.handle)
    }

    /// Chunked copy reporting throttled progress
    async fn copy_chunks(
        &self,
        reader: &mut RemoteReader,
        writer: &mut LocalWriter,
        throttle: &mut ProgressThrottle,
        mut on_progress: impl FnMut(u8),
    ) -> std::io::Result<u64> {
        let mut buffer = vec![0u8; self.inner.config.effective_chunk_size()];
        let mut transferred = 0u64;
        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                return Ok(transferred);
            }
            writer.write_all(&buffer[..n]).await?;
            transferred += n as u64;

            if let Some(percent) = throttle.record(transferred) {
                on_progress(percent);
            }
        }
    }

    async fn push_resource(
        &self,
        resource: &LocalResource,
        directory: &str,
        epoch: u64,
    ) -> Result<String, SessionError> {
        let failed = |cause: String| SessionError::TransferFailed {
            direction: TransferDirection::Upload,
            cause,
        };
        let name = match self.inner.local.display_name(resource).await {
            Some(name) => name,
            None => last_segment(&resource.address).to_string(),
        };
        self.report(epoch, format!("Uploading '{}'...", name));

        let target = join_remote_path(directory, &name);

        let fs = self.open_fs().await?;
        let mut input = self
            .inner
            .local
            .open_input(resource)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let mut output = fs
            .open_write(&target)
            .await
            .map_err(|e| SessionError::from_remote(e, failed))?;

        let copied = tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(|e| failed(e.to_string()))?;
        output.shutdown().await.map_err(|e| failed(e.to_string()))?;

        debug!("Uploaded {} bytes to {}", copied, target);
        Ok(target)
    }
}
