//! Mounted share backend
//!
//! Serves shares that the operating system already mounted (CIFS, NFS, a
//! synced folder) by mapping `scheme://host/share/rest` onto
//! `<mount point>/rest`. Authentication happened at mount time, so the
//! authenticator is only logged.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::error::RemoteError;
use super::path_utils::{ensure_trailing_separator, join_remote_path, split_share_url};
use super::{Authenticator, RemoteFs, RemoteFsProvider, RemoteObject, RemoteReader, RemoteWriter};

/// Provider for locally mounted shares
#[derive(Clone, Default)]
pub struct MountedShareProvider {
    mounts: Arc<RwLock<HashMap<(String, String), PathBuf>>>,
}

impl MountedShareProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `mount_point` as `host/share`
    pub fn mount(&self, host: &str, share: &str, mount_point: impl Into<PathBuf>) {
        let mount_point = mount_point.into();
        info!("Mounting {}/{} at {:?}", host, share, mount_point);
        self.mounts
            .write()
            .insert((host.to_lowercase(), share.to_string()), mount_point);
    }
}

#[async_trait]
impl RemoteFsProvider for MountedShareProvider {
    async fn open_session(
        &self,
        root_url: &str,
        auth: Option<&Authenticator>,
    ) -> Result<Arc<dyn RemoteFs>, RemoteError> {
        debug!(
            "Opening mounted session for {} as {}",
            root_url,
            auth.map(|a| a.username.as_str()).unwrap_or("<anonymous>")
        );
        Ok(Arc::new(MountedSession {
            mounts: self.mounts.clone(),
        }))
    }
}

struct MountedSession {
    mounts: Arc<RwLock<HashMap<(String, String), PathBuf>>>,
}

impl MountedSession {
    /// Local path for a share URL; `None` when the share is not mounted
    fn local_path(&self, url: &str) -> Result<Option<PathBuf>, RemoteError> {
        let loc = split_share_url(url).ok_or_else(|| RemoteError::InvalidPath(url.into()))?;
        let mounts = self.mounts.read();
        Ok(mounts
            .get(&(loc.host.to_lowercase(), loc.share.clone()))
            .map(|root| {
                let mut path = root.clone();
                for segment in loc.relative.split('/').filter(|s| !s.is_empty()) {
                    path.push(segment);
                }
                path
            }))
    }

    fn require(&self, url: &str) -> Result<PathBuf, RemoteError> {
        self.local_path(url)?
            .ok_or_else(|| RemoteError::NotFound(url.to_string()))
    }
}

#[async_trait]
impl RemoteFs for MountedSession {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        match self.local_path(path)? {
            Some(local) => tokio::fs::try_exists(&local)
                .await
                .map_err(|e| RemoteError::from_io(e, path)),
            None => Ok(false),
        }
    }

    /// Symlinks are never directories here, so nothing descends out of the mount
    async fn is_directory(&self, path: &str) -> Result<bool, RemoteError> {
        match self.local_path(path)? {
            Some(local) => match tokio::fs::symlink_metadata(&local).await {
                Ok(meta) => Ok(meta.is_dir()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(RemoteError::from_io(e, path)),
            },
            None => Ok(false),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteObject>, RemoteError> {
        let local = self.require(path)?;
        let base = ensure_trailing_separator(path);

        let mut read_dir = tokio::fs::read_dir(&local)
            .await
            .map_err(|e| RemoteError::from_io(e, path))?;

        let mut objects = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| RemoteError::from_io(e, path))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_directory = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let reported = if is_directory {
                format!("{}/", name)
            } else {
                name
            };
            objects.push(RemoteObject {
                path: join_remote_path(&base, &reported),
                name: reported,
                is_directory,
            });
        }
        Ok(objects)
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, RemoteError> {
        let local = self.require(path)?;
        let file = tokio::fs::File::open(&local)
            .await
            .map_err(|e| RemoteError::from_io(e, path))?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &str) -> Result<RemoteWriter, RemoteError> {
        let local = self.require(path)?;
        let file = tokio::fs::File::create(&local)
            .await
            .map_err(|e| RemoteError::from_io(e, path))?;
        Ok(Box::new(file))
    }

    async fn mkdir(&self, path: &str) -> Result<(), RemoteError> {
        let local = self.require(path)?;
        tokio::fs::create_dir(&local)
            .await
            .map_err(|e| RemoteError::from_io(e, path))
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let local = self.require(path)?;
        let meta = tokio::fs::symlink_metadata(&local)
            .await
            .map_err(|e| RemoteError::from_io(e, path))?;
        let result = if meta.file_type().is_dir() {
            tokio::fs::remove_dir(&local).await
        } else {
            tokio::fs::remove_file(&local).await
        };
        result.map_err(|e| RemoteError::from_io(e, path))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), RemoteError> {
        let old_local = self.require(old_path)?;
        let new_local = self.require(new_path)?;
        tokio::fs::rename(&old_local, &new_local)
            .await
            .map_err(|e| RemoteError::from_io(e, old_path))
    }

    async fn length(&self, path: &str) -> Result<u64, RemoteError> {
        let local = self.require(path)?;
        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|e| RemoteError::from_io(e, path))?;
        Ok(if meta.is_file() { meta.len() } else { 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_mounted_share_round_trip() {
        let temp = tempdir().unwrap();
        std::fs::create_dir(temp.path().join("Docs")).unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"hi").unwrap();

        let provider = MountedShareProvider::new();
        provider.mount("nas", "home", temp.path());
        let fs = provider.open_session("smb://nas/home/", None).await.unwrap();

        assert!(fs.exists("smb://nas/home/").await.unwrap());
        assert!(fs.is_directory("smb://nas/home/Docs/").await.unwrap());
        assert_eq!(fs.length("smb://nas/home/notes.txt").await.unwrap(), 2);

        let mut names: Vec<String> = fs
            .list("smb://nas/home/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Docs/".to_string(), "notes.txt".to_string()]);

        fs.rename("smb://nas/home/notes.txt", "smb://nas/home/Docs/moved.txt")
            .await
            .unwrap();
        assert!(temp.path().join("Docs").join("moved.txt").exists());
    }

    #[tokio::test]
    async fn test_unmounted_share_is_missing() {
        let provider = MountedShareProvider::new();
        let fs = provider.open_session("smb://nas/none/", None).await.unwrap();
        assert!(!fs.exists("smb://nas/none/").await.unwrap());
        assert!(matches!(
            fs.list("smb://nas/none/").await.unwrap_err(),
            RemoteError::NotFound(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_tree_removes_symlink_without_following() {
        let share = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("precious.txt"), b"keep").unwrap();
        std::os::unix::fs::symlink(outside.path(), share.path().join("link")).unwrap();

        let provider = MountedShareProvider::new();
        provider.mount("nas", "home", share.path());
        let fs = provider.open_session("smb://nas/home/", None).await.unwrap();

        assert!(!fs.is_directory("smb://nas/home/link/").await.unwrap());
        let removed = crate::engine::mutation::delete_tree(&fs, "smb://nas/home/link/")
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(outside.path().join("precious.txt").exists());
        assert!(std::fs::symlink_metadata(share.path().join("link")).is_err());
    }
}
