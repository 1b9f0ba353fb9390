//! Directory-backed local storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{LocalError, LocalHandle, LocalReader, LocalResource, LocalStorage, LocalTarget};
use crate::config::EngineConfig;

/// Upper bound on `name (n).ext` probing
const MAX_UNIQUE_ATTEMPTS: u32 = 10_000;

/// Stores "open" downloads in a cache dir and public downloads in a
/// user-visible download dir
#[derive(Debug, Clone)]
pub struct FsLocalStorage {
    cache_dir: PathBuf,
    download_dir: PathBuf,
}

/// Reduce a server-provided name to a single path component
fn sanitize_name(name: &str) -> Result<String, LocalError> {
    let trimmed = name.trim().trim_end_matches('/');
    Path::new(trimmed)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| LocalError::InvalidName(name.to_string()))
}

/// `report.pdf` -> `report (n).pdf`
fn numbered_name(name: &str, n: u32) -> String {
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{} ({}).{}",
            stem.to_string_lossy(),
            n,
            ext.to_string_lossy()
        ),
        _ => format!("{} ({})", name, n),
    }
}

impl FsLocalStorage {
    pub fn new(cache_dir: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            download_dir: download_dir.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.resolved_cache_dir(), config.resolved_download_dir())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

#[async_trait]
impl LocalStorage for FsLocalStorage {
    async fn create_temp(&self, name: &str) -> Result<LocalTarget, LocalError> {
        let name = sanitize_name(name)?;
        fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_dir.join(&name);
        let file = fs::File::create(&path).await?;
        debug!("Created cache object {:?}", path);
        Ok(LocalTarget {
            handle: LocalHandle {
                path,
                display_name: name,
            },
            writer: Box::new(file),
        })
    }

    async fn create_public(
        &self,
        name: &str,
        subfolder: Option<&str>,
    ) -> Result<LocalTarget, LocalError> {
        let name = sanitize_name(name)?;
        let mut dir = self.download_dir.clone();
        if let Some(sub) = subfolder {
            dir.push(sanitize_name(sub)?);
        }
        fs::create_dir_all(&dir).await?;

        for attempt in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.clone()
            } else {
                numbered_name(&name, attempt)
            };
            let path = dir.join(&candidate);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    debug!("Created public object {:?}", path);
                    return Ok(LocalTarget {
                        handle: LocalHandle {
                            path,
                            display_name: candidate,
                        },
                        writer: Box::new(file),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(LocalError::Io(e)),
            }
        }
        Err(LocalError::InvalidName(name))
    }

    async fn open_input(&self, resource: &LocalResource) -> Result<LocalReader, LocalError> {
        let path = resource
            .to_path()
            .ok_or_else(|| LocalError::UnsupportedAddress(resource.address.clone()))?;
        let file = fs::File::open(&path).await?;
        Ok(Box::new(file))
    }

    async fn display_name(&self, resource: &LocalResource) -> Option<String> {
        let path = resource.to_path()?;
        let meta = fs::metadata(&path).await.ok()?;
        if !meta.is_file() {
            return None;
        }
        path.file_name().map(|n| n.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_name("Docs/").unwrap(), "Docs");
        assert_eq!(sanitize_name("../../etc/passwd").unwrap(), "passwd");
        assert!(sanitize_name("..").is_err());
        assert!(sanitize_name("").is_err());
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("report.pdf", 1), "report (1).pdf");
        assert_eq!(numbered_name("Makefile", 2), "Makefile (2)");
    }

    #[tokio::test]
    async fn test_public_downloads_never_overwrite() {
        let temp = tempdir().unwrap();
        let storage = FsLocalStorage::new(temp.path().join("cache"), temp.path().join("dl"));

        let mut first = storage.create_public("a.txt", None).await.unwrap();
        first.writer.write_all(b"one").await.unwrap();
        first.writer.shutdown().await.unwrap();

        let second = storage.create_public("a.txt", None).await.unwrap();
        assert_eq!(second.handle.display_name, "a (1).txt");
        assert_eq!(std::fs::read(&first.handle.path).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_public_subfolder() {
        let temp = tempdir().unwrap();
        let storage = FsLocalStorage::new(temp.path().join("cache"), temp.path().join("dl"));

        let target = storage.create_public("a.txt", Some("Shares")).await.unwrap();
        assert_eq!(target.handle.path, temp.path().join("dl").join("Shares").join("a.txt"));
    }

    #[tokio::test]
    async fn test_temp_objects_are_replaced() {
        let temp = tempdir().unwrap();
        let storage = FsLocalStorage::new(temp.path().join("cache"), temp.path().join("dl"));

        let first = storage.create_temp("view.png").await.unwrap();
        let second = storage.create_temp("view.png").await.unwrap();
        assert_eq!(first.handle.path, second.handle.path);
    }

    #[tokio::test]
    async fn test_display_name_needs_metadata() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("photo.jpg");
        std::fs::write(&file, b"x").unwrap();
        let storage = FsLocalStorage::new(temp.path(), temp.path());

        let found = LocalResource::new(format!("file://{}", file.to_string_lossy()));
        assert_eq!(storage.display_name(&found).await.as_deref(), Some("photo.jpg"));

        let missing = LocalResource::new("content://media/external/42");
        assert_eq!(storage.display_name(&missing).await, None);
    }
}
