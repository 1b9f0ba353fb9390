//! Mutation Engine
//!
//! Each mutation re-checks the server before acting and refreshes the
//! affected directory once it is done.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::SessionError;
use super::operation::{OperationHandle, OperationKind};
use super::SessionEngine;
use crate::remote::path_utils::{
    ensure_trailing_separator, last_segment, parent_path, strip_trailing_separator,
};
use crate::remote::RemoteFs;

/// Delete `path` and everything below it, children first.
///
/// Returns the number of removed objects. Does not touch the snapshot.
pub async fn delete_tree(fs: &Arc<dyn RemoteFs>, path: &str) -> Result<u64, SessionError> {
    let is_dir = fs
        .is_directory(path)
        .await
        .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Delete")))?;

    let mut deleted = 0u64;
    if is_dir {
        let children = fs.list(path).await.map_err(|e| {
            SessionError::from_remote(e, |cause| {
                SessionError::RecursiveDeleteChildListingFailed {
                    path: path.to_string(),
                    cause,
                }
            })
        })?;

        for child in children {
            if child.is_directory {
                // Boxed to keep the future size finite
                deleted += Box::pin(delete_tree(fs, &child.path)).await?;
            } else {
                fs.delete(&child.path)
                    .await
                    .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Delete")))?;
                deleted += 1;
            }
        }
    }

    fs.delete(path)
        .await
        .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Delete")))?;
    debug!("Deleted {}", path);
    Ok(deleted + 1)
}

impl SessionEngine {
    /// Create `name` below `parent` unless something already has that name
    pub fn create_folder(&self, parent: &str, name: &str) -> OperationHandle<String> {
        let parent = ensure_trailing_separator(parent);
        let name = strip_trailing_separator(name.trim()).to_string();
        let epoch = self.session_epoch();

        let op = self.inner.operations.start(OperationKind::CreateFolder);
        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control.run(engine.make_folder(&parent, &name)).await;
            engine
                .settle_mutation(epoch, &parent, result, |_| {
                    format!("Folder '{}' created.", name)
                })
                .await
        })
    }

    /// Rename the object at `old_path` within its parent directory
    pub fn rename(&self, old_path: &str, new_name: &str) -> OperationHandle<String> {
        let old_path = old_path.to_string();
        let new_name = strip_trailing_separator(new_name.trim()).to_string();
        let parent = parent_path(&old_path);
        let epoch = self.session_epoch();

        let op = self.inner.operations.start(OperationKind::Rename);
        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control
                .run(engine.rename_object(&old_path, &parent, &new_name))
                .await;
            engine
                .settle_mutation(epoch, &parent, result, |_| {
                    format!("Renamed to '{}'.", new_name)
                })
                .await
        })
    }

    /// Delete `path`, recursively for directories.
    ///
    /// Resolves to the number of removed objects. The parent is refreshed once,
    /// after the whole tree is gone.
    pub fn delete(&self, path: &str) -> OperationHandle<u64> {
        let path = path.to_string();
        let parent = parent_path(&path);
        let epoch = self.session_epoch();

        let op = self.inner.operations.start(OperationKind::Delete);
        let control = op.control();
        let engine = self.clone();
        op.spawn(async move {
            let result = control.run(engine.delete_object(&path)).await;
            engine
                .settle_mutation(epoch, &parent, result, |count| {
                    debug!("Removed {} objects under {}", count, path);
                    format!("'{}' deleted.", last_segment(&path))
                })
                .await
        })
    }

    async fn make_folder(&self, parent: &str, name: &str) -> Result<String, SessionError> {
        if name.is_empty() {
            return Err(SessionError::MutationFailed {
                action: "Create folder".into(),
                cause: "name is empty".into(),
            });
        }
        let fs = self.open_fs().await?;
        let target = format!("{}{}/", parent, name);

        let exists = fs
            .exists(&target)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Create folder")))?;
        if exists {
            return Err(SessionError::NameConflict(name.to_string()));
        }

        fs.mkdir(&target)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Create folder")))?;
        info!("Created folder {}", target);
        Ok(target)
    }

    async fn rename_object(
        &self,
        old_path: &str,
        parent: &str,
        new_name: &str,
    ) -> Result<String, SessionError> {
        let fs = self.open_fs().await?;
        let source_exists = fs
            .exists(old_path)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Rename")))?;
        if !source_exists {
            return Err(SessionError::TargetMissing(last_segment(old_path).to_string()));
        }
        if new_name.is_empty() {
            return Err(SessionError::MutationFailed {
                action: "Rename".into(),
                cause: "name is empty".into(),
            });
        }

        let new_path = format!("{}{}", parent, new_name);
        let target_exists = fs
            .exists(&new_path)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Rename")))?;
        if target_exists {
            return Err(SessionError::NameConflict(new_name.to_string()));
        }

        fs.rename(old_path, &new_path)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Rename")))?;
        info!("Renamed {} to {}", old_path, new_path);
        Ok(new_path)
    }

    async fn delete_object(&self, path: &str) -> Result<u64, SessionError> {
        let fs = self.open_fs().await?;
        let exists = fs
            .exists(path)
            .await
            .map_err(|e| SessionError::from_remote(e, SessionError::mutation("Delete")))?;
        if !exists {
            return Err(SessionError::TargetMissing(last_segment(path).to_string()));
        }
        info!("Deleting {}", path);
        delete_tree(&fs, path).await
    }

    /// Narrate the outcome; on success refresh `parent`
    async fn settle_mutation<T>(
        &self,
        epoch: u64,
        parent: &str,
        result: Result<T, SessionError>,
        success: impl FnOnce(&T) -> String,
    ) -> Result<T, SessionError> {
        match &result {
            Ok(value) => {
                self.report(epoch, success(value));
                self.refresh_listing(parent, epoch).await;
            }
            Err(e) => {
                warn!("Mutation failed: {}", e);
                self.report(epoch, e.to_string());
            }
        }
        result
    }
}
