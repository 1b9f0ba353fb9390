//! In-memory share backend
//!
//! Serves any number of `host/share` trees from process memory. Besides
//! embedding, it is the backend the engine is exercised against: hosts can be
//! made unreachable, credentials can be required, and individual paths can be
//! made to fail listing, stall reads, pace reads, fail mid-read or hide
//! their length. [`MemoryRemote::clear_faults`] lifts all of them.

use std::collections::{HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tracing::debug;

use super::error::RemoteError;
use super::path_utils::{ensure_trailing_separator, join_remote_path, split_share_url};
use super::{Authenticator, RemoteFs, RemoteFsProvider, RemoteObject, RemoteReader, RemoteWriter};

#[derive(Debug, Clone)]
enum Node {
    /// Child names in creation order
    Dir(Vec<String>),
    File(Vec<u8>),
}

/// One share's object tree, keyed by path relative to the share root
#[derive(Debug)]
struct ShareTree {
    nodes: HashMap<String, Node>,
}

fn split_parent(rel: &str) -> Option<(&str, &str)> {
    if rel.is_empty() {
        return None;
    }
    Some(rel.rsplit_once('/').unwrap_or(("", rel)))
}

fn normalize_rel(rel: &str) -> String {
    rel.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl ShareTree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), Node::Dir(Vec::new()));
        Self { nodes }
    }

    fn get(&self, rel: &str) -> Option<&Node> {
        self.nodes.get(rel)
    }

    fn parent_children(&mut self, rel: &str) -> Result<(&mut Vec<String>, String), RemoteError> {
        let (parent, name) =
            split_parent(rel).ok_or_else(|| RemoteError::PermissionDenied("share root".into()))?;
        let name = name.to_string();
        match self.nodes.get_mut(parent) {
            Some(Node::Dir(children)) => Ok((children, name)),
            Some(Node::File(_)) => Err(RemoteError::NotADirectory(parent.to_string())),
            None => Err(RemoteError::NotFound(parent.to_string())),
        }
    }

    fn insert_dir(&mut self, rel: &str) -> Result<(), RemoteError> {
        if self.nodes.contains_key(rel) {
            return Err(RemoteError::AlreadyExists(rel.to_string()));
        }
        let (children, name) = self.parent_children(rel)?;
        children.push(name);
        self.nodes.insert(rel.to_string(), Node::Dir(Vec::new()));
        Ok(())
    }

    fn write_file(&mut self, rel: &str, data: Vec<u8>) -> Result<(), RemoteError> {
        match self.nodes.get_mut(rel) {
            Some(Node::File(existing)) => {
                *existing = data;
                return Ok(());
            }
            Some(Node::Dir(_)) => return Err(RemoteError::AlreadyExists(rel.to_string())),
            None => {}
        }
        let (children, name) = self.parent_children(rel)?;
        children.push(name);
        self.nodes.insert(rel.to_string(), Node::File(data));
        Ok(())
    }

    fn append(&mut self, rel: &str, bytes: &[u8]) -> io::Result<()> {
        match self.nodes.get_mut(rel) {
            Some(Node::File(data)) => {
                data.extend_from_slice(bytes);
                Ok(())
            }
            _ => Err(io::Error::new(io::ErrorKind::NotFound, rel.to_string())),
        }
    }

    fn remove(&mut self, rel: &str) -> Result<(), RemoteError> {
        match self.nodes.get(rel) {
            None => return Err(RemoteError::NotFound(rel.to_string())),
            Some(Node::Dir(children)) if !children.is_empty() => {
                return Err(RemoteError::DirectoryNotEmpty(rel.to_string()))
            }
            Some(_) => {}
        }
        let (children, name) = self.parent_children(rel)?;
        children.retain(|c| *c != name);
        self.nodes.remove(rel);
        Ok(())
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<(), RemoteError> {
        if !self.nodes.contains_key(old) {
            return Err(RemoteError::NotFound(old.to_string()));
        }
        if self.nodes.contains_key(new) {
            return Err(RemoteError::AlreadyExists(new.to_string()));
        }
        let old_prefix = format!("{}/", old);
        if new.starts_with(&old_prefix) || old.is_empty() {
            return Err(RemoteError::InvalidPath(new.to_string()));
        }

        // Validate the destination parent before touching anything
        self.parent_children(new)?;

        let moved: Vec<String> = self
            .nodes
            .keys()
            .filter(|k| *k == old || k.starts_with(&old_prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = self.nodes.remove(&key) {
                let new_key = format!("{}{}", new, &key[old.len()..]);
                self.nodes.insert(new_key, node);
            }
        }

        let (old_children, old_name) = self.parent_children(old)?;
        old_children.retain(|c| *c != old_name);
        let (new_children, new_name) = self.parent_children(new)?;
        new_children.push(new_name);
        Ok(())
    }

    fn object_count(&self) -> usize {
        self.nodes.len() - 1
    }
}

/// Handle for seeding and inspecting one in-memory share
///
/// Paths are relative to the share root (`"docs/a.txt"`).
#[derive(Clone)]
pub struct MemoryShare {
    tree: Arc<Mutex<ShareTree>>,
}

impl MemoryShare {
    fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(ShareTree::new())),
        }
    }

    /// Create a directory and any missing ancestors
    pub fn mkdir_all(&self, rel: &str) -> &Self {
        let rel = normalize_rel(rel);
        let mut tree = self.tree.lock();
        let mut current = String::new();
        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            if tree.get(&current).is_none() {
                // Parent exists by construction
                let _ = tree.insert_dir(&current);
            }
        }
        self
    }

    /// Create or replace a file, creating missing ancestors
    pub fn put_file(&self, rel: &str, data: impl Into<Vec<u8>>) -> &Self {
        let rel = normalize_rel(rel);
        if let Some((parent, _)) = split_parent(&rel) {
            self.mkdir_all(parent);
        }
        let _ = self.tree.lock().write_file(&rel, data.into());
        self
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.tree.lock().get(&normalize_rel(rel)).is_some()
    }

    pub fn is_dir(&self, rel: &str) -> bool {
        matches!(self.tree.lock().get(&normalize_rel(rel)), Some(Node::Dir(_)))
    }

    pub fn read_file(&self, rel: &str) -> Option<Vec<u8>> {
        match self.tree.lock().get(&normalize_rel(rel)) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Child names of a directory, in creation order
    pub fn children(&self, rel: &str) -> Vec<String> {
        match self.tree.lock().get(&normalize_rel(rel)) {
            Some(Node::Dir(children)) => children.clone(),
            _ => Vec::new(),
        }
    }

    /// Number of objects below the share root
    pub fn object_count(&self) -> usize {
        self.tree.lock().object_count()
    }
}

#[derive(Default)]
struct Faults {
    unreachable_hosts: HashSet<String>,
    failing_lists: HashSet<String>,
    denied_lists: HashSet<String>,
    paced_reads: HashSet<String>,
    stalled_reads: HashSet<String>,
    failing_reads: HashMap<String, usize>,
    unknown_lengths: HashSet<String>,
}

struct MemoryInner {
    shares: RwLock<HashMap<(String, String), MemoryShare>>,
    credentials: RwLock<Option<(String, String)>>,
    faults: RwLock<Faults>,
    /// Writer halves of stalled reads; kept alive so readers never see EOF
    stalled_pipes: Mutex<Vec<DuplexStream>>,
}

/// In-memory share server and [`RemoteFsProvider`]
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<MemoryInner>,
}

fn fault_key(url: &str) -> Option<String> {
    split_share_url(url).map(|loc| format!("{}/{}/{}", loc.host, loc.share, loc.relative))
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                shares: RwLock::new(HashMap::new()),
                credentials: RwLock::new(None),
                faults: RwLock::new(Faults::default()),
                stalled_pipes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register (or fetch) a share
    pub fn add_share(&self, host: &str, share: &str) -> MemoryShare {
        self.inner
            .shares
            .write()
            .entry((host.to_string(), share.to_string()))
            .or_insert_with(MemoryShare::new)
            .clone()
    }

    /// Require these credentials for every new session
    pub fn require_credentials(&self, username: &str, password: &str) {
        *self.inner.credentials.write() = Some((username.to_string(), password.to_string()));
    }

    /// Session opens against this host never complete
    pub fn set_unreachable(&self, host: &str) {
        self.inner
            .faults
            .write()
            .unreachable_hosts
            .insert(host.to_string());
    }

    /// Listing this directory URL fails with a disconnect
    pub fn fail_listing(&self, url: &str) {
        if let Some(key) = fault_key(url) {
            self.inner.faults.write().failing_lists.insert(key);
        }
    }

    /// Listing this directory URL fails with permission denied
    pub fn deny_listing(&self, url: &str) {
        if let Some(key) = fault_key(url) {
            self.inner.faults.write().denied_lists.insert(key);
        }
    }

    /// Reads of this file URL hand control back to the scheduler before
    /// every chunk
    pub fn pace_reads(&self, url: &str) {
        if let Some(key) = fault_key(url) {
            self.inner.faults.write().paced_reads.insert(key);
        }
    }

    /// Lift every fault; stalled readers see end of file
    pub fn clear_faults(&self) {
        *self.inner.faults.write() = Faults::default();
        self.inner.stalled_pipes.lock().clear();
    }

    /// Reads of this file URL block until [`Self::clear_faults`]
    pub fn stall_reads(&self, url: &str) {
        if let Some(key) = fault_key(url) {
            self.inner.faults.write().stalled_reads.insert(key);
        }
    }

    /// Reads of this file URL fail after `bytes` bytes
    pub fn fail_reads_after(&self, url: &str, bytes: usize) {
        if let Some(key) = fault_key(url) {
            self.inner.faults.write().failing_reads.insert(key, bytes);
        }
    }

    /// `length` of this URL reports 0 (unknown)
    pub fn hide_length(&self, url: &str) {
        if let Some(key) = fault_key(url) {
            self.inner.faults.write().unknown_lengths.insert(key);
        }
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFsProvider for MemoryRemote {
    async fn open_session(
        &self,
        root_url: &str,
        auth: Option<&Authenticator>,
    ) -> Result<Arc<dyn RemoteFs>, RemoteError> {
        let location =
            split_share_url(root_url).ok_or_else(|| RemoteError::InvalidPath(root_url.into()))?;

        let unreachable = self
            .inner
            .faults
            .read()
            .unreachable_hosts
            .contains(&location.host);
        if unreachable {
            debug!("Host {} unreachable, session open will not complete", location.host);
            return std::future::pending().await;
        }

        let required = self.inner.credentials.read().clone();
        if let Some((user, pass)) = required {
            match auth {
                Some(a) if a.username == user && a.password == pass => {}
                Some(a) => {
                    return Err(RemoteError::AuthFailed(format!(
                        "Logon failure for user '{}'",
                        a.username
                    )))
                }
                None => return Err(RemoteError::AuthFailed("Anonymous access denied".into())),
            }
        }

        Ok(Arc::new(MemorySession {
            inner: self.inner.clone(),
        }))
    }
}

struct MemorySession {
    inner: Arc<MemoryInner>,
}

impl MemorySession {
    fn resolve(&self, url: &str) -> Result<(Option<MemoryShare>, String, String), RemoteError> {
        let loc = split_share_url(url).ok_or_else(|| RemoteError::InvalidPath(url.into()))?;
        let key = format!("{}/{}/{}", loc.host, loc.share, loc.relative);
        let share = self
            .inner
            .shares
            .read()
            .get(&(loc.host.clone(), loc.share.clone()))
            .cloned();
        Ok((share, loc.relative, key))
    }

    fn share(&self, url: &str) -> Result<(MemoryShare, String, String), RemoteError> {
        match self.resolve(url)? {
            (Some(share), rel, key) => Ok((share, rel, key)),
            (None, _, _) => Err(RemoteError::NotFound(url.to_string())),
        }
    }
}

#[async_trait]
impl RemoteFs for MemorySession {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        let (share, rel, _) = self.resolve(path)?;
        let found = match share {
            Some(share) => share.tree.lock().get(&rel).is_some(),
            None => false,
        };
        Ok(found)
    }

    async fn is_directory(&self, path: &str) -> Result<bool, RemoteError> {
        let (share, rel, _) = self.resolve(path)?;
        let is_dir = match share {
            Some(share) => matches!(share.tree.lock().get(&rel), Some(Node::Dir(_))),
            None => false,
        };
        Ok(is_dir)
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteObject>, RemoteError> {
        let (share, rel, key) = self.share(path)?;
        {
            let faults = self.inner.faults.read();
            if faults.failing_lists.contains(&key) {
                return Err(RemoteError::Disconnected(format!(
                    "Connection reset while listing {}",
                    path
                )));
            }
            if faults.denied_lists.contains(&key) {
                return Err(RemoteError::PermissionDenied(path.to_string()));
            }
        }

        let base = ensure_trailing_separator(path);
        let tree = share.tree.lock();
        let children = match tree.get(&rel) {
            Some(Node::Dir(children)) => children.clone(),
            Some(Node::File(_)) => return Err(RemoteError::NotADirectory(path.to_string())),
            None => return Err(RemoteError::NotFound(path.to_string())),
        };

        Ok(children
            .into_iter()
            .map(|name| {
                let child_rel = if rel.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", rel, name)
                };
                let is_directory = matches!(tree.get(&child_rel), Some(Node::Dir(_)));
                // Directories are reported with a trailing separator
                let reported = if is_directory {
                    format!("{}/", name)
                } else {
                    name
                };
                RemoteObject {
                    path: join_remote_path(&base, &reported),
                    name: reported,
                    is_directory,
                }
            })
            .collect())
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, RemoteError> {
        let (share, rel, key) = self.share(path)?;
        let data = match share.tree.lock().get(&rel) {
            Some(Node::File(data)) => data.clone(),
            Some(Node::Dir(_)) => return Err(RemoteError::NotADirectory(path.to_string())),
            None => return Err(RemoteError::NotFound(path.to_string())),
        };

        let (stalled, paced, fail_after) = {
            let faults = self.inner.faults.read();
            (
                faults.stalled_reads.contains(&key),
                faults.paced_reads.contains(&key),
                faults.failing_reads.get(&key).copied(),
            )
        };
        if stalled {
            let (reader, writer) = tokio::io::duplex(64);
            self.inner.stalled_pipes.lock().push(writer);
            return Ok(Box::new(reader));
        }
        if let Some(limit) = fail_after {
            return Ok(Box::new(FailingReader {
                data,
                pos: 0,
                remaining: limit,
            }));
        }
        if paced {
            return Ok(Box::new(PacedReader {
                inner: io::Cursor::new(data),
                yielded: false,
            }));
        }
        Ok(Box::new(io::Cursor::new(data)))
    }

    async fn open_write(&self, path: &str) -> Result<RemoteWriter, RemoteError> {
        let (share, rel, _) = self.share(path)?;
        share.tree.lock().write_file(&rel, Vec::new())?;
        Ok(Box::new(MemoryWriter {
            tree: share.tree.clone(),
            rel,
        }))
    }

    async fn mkdir(&self, path: &str) -> Result<(), RemoteError> {
        let (share, rel, _) = self.share(path)?;
        let result = share.tree.lock().insert_dir(&rel);
        result
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let (share, rel, _) = self.share(path)?;
        let result = share.tree.lock().remove(&rel);
        result
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), RemoteError> {
        let (share, old_rel, _) = self.share(old_path)?;
        let (target, new_rel, _) = self.share(new_path)?;
        if !Arc::ptr_eq(&share.tree, &target.tree) {
            return Err(RemoteError::InvalidPath(format!(
                "Cannot rename across shares: {} -> {}",
                old_path, new_path
            )));
        }
        let result = share.tree.lock().rename(&old_rel, &new_rel);
        result
    }

    async fn length(&self, path: &str) -> Result<u64, RemoteError> {
        let (share, rel, key) = self.share(path)?;
        if self.inner.faults.read().unknown_lengths.contains(&key) {
            return Ok(0);
        }
        let length = match share.tree.lock().get(&rel) {
            Some(Node::File(data)) => Some(data.len() as u64),
            Some(Node::Dir(_)) => Some(0),
            None => None,
        };
        length.ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}

/// Appends straight into the tree, so partial writes stay visible
struct MemoryWriter {
    tree: Arc<Mutex<ShareTree>>,
    rel: String,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let result = self.tree.lock().append(&self.rel, buf);
        Poll::Ready(result.map(|_| buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Returns `Pending` once before every read
struct PacedReader {
    inner: io::Cursor<Vec<u8>>,
    yielded: bool,
}

impl AsyncRead for PacedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.yielded {
            self.yielded = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.yielded = false;
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

/// Yields `remaining` bytes, then fails with a connection reset
struct FailingReader {
    data: Vec<u8>,
    pos: usize,
    remaining: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        let start = self.pos;
        let end = self
            .data
            .len()
            .min(start + self.remaining)
            .min(start + buf.remaining());
        buf.put_slice(&self.data[start..end]);
        self.pos = end;
        self.remaining -= end - start;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const ROOT: &str = "smb://nas/media/";

    async fn session(remote: &MemoryRemote) -> Arc<dyn RemoteFs> {
        remote.open_session(ROOT, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_list_reports_directories_with_separator() {
        let remote = MemoryRemote::new();
        remote
            .add_share("nas", "media")
            .put_file("b.txt", "b")
            .mkdir_all("Music");
        let fs = session(&remote).await;

        let entries = fs.list(ROOT).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "b.txt");
        assert!(!entries[0].is_directory);
        assert_eq!(entries[1].name, "Music/");
        assert_eq!(entries[1].path, "smb://nas/media/Music/");
        assert!(entries[1].is_directory);
    }

    #[tokio::test]
    async fn test_missing_share_does_not_exist() {
        let remote = MemoryRemote::new();
        let fs = session(&remote).await;
        assert!(!fs.exists(ROOT).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_requires_empty_directory() {
        let remote = MemoryRemote::new();
        let share = remote.add_share("nas", "media");
        share.put_file("dir/a.txt", "a");
        let fs = session(&remote).await;

        let err = fs.delete("smb://nas/media/dir/").await.unwrap_err();
        assert!(matches!(err, RemoteError::DirectoryNotEmpty(_)));

        fs.delete("smb://nas/media/dir/a.txt").await.unwrap();
        fs.delete("smb://nas/media/dir/").await.unwrap();
        assert_eq!(share.object_count(), 0);
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let remote = MemoryRemote::new();
        let share = remote.add_share("nas", "media");
        share.put_file("old/inner/a.txt", "a");
        let fs = session(&remote).await;

        fs.rename("smb://nas/media/old/", "smb://nas/media/new")
            .await
            .unwrap();
        assert!(!share.exists("old"));
        assert_eq!(share.read_file("new/inner/a.txt").unwrap(), b"a");
        assert_eq!(share.children(""), vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let remote = MemoryRemote::new();
        remote.add_share("nas", "media");
        let fs = session(&remote).await;

        let mut writer = fs.open_write("smb://nas/media/out.bin").await.unwrap();
        writer.write_all(b"hello").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut reader = fs.open_read("smb://nas/media/out.bin").await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");
        assert_eq!(fs.length("smb://nas/media/out.bin").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_credentials_enforced() {
        let remote = MemoryRemote::new();
        remote.require_credentials("alice", "secret");

        let err = remote.open_session(ROOT, None).await.err().unwrap();
        assert!(err.is_session_loss());

        let auth = Authenticator::new("alice", "secret");
        assert!(remote.open_session(ROOT, Some(&auth)).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_reader_stops_midway() {
        let remote = MemoryRemote::new();
        remote.add_share("nas", "media").put_file("big.bin", vec![7u8; 100]);
        remote.fail_reads_after("smb://nas/media/big.bin", 40);
        let fs = session(&remote).await;

        let mut reader = fs.open_read("smb://nas/media/big.bin").await.unwrap();
        let mut buf = Vec::new();
        let err = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(buf.len(), 40);
    }

    #[tokio::test]
    async fn test_clear_faults_releases_stalled_reads() {
        let remote = MemoryRemote::new();
        remote.add_share("nas", "media").put_file("slow.bin", vec![1u8; 10]);
        remote.stall_reads("smb://nas/media/slow.bin");
        remote.deny_listing(ROOT);
        let fs = session(&remote).await;

        assert!(matches!(
            fs.list(ROOT).await.unwrap_err(),
            RemoteError::PermissionDenied(_)
        ));
        let mut reader = fs.open_read("smb://nas/media/slow.bin").await.unwrap();
        let pending = tokio::spawn(async move {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await.map(|_| buf)
        });

        remote.clear_faults();
        assert!(remote.inner.stalled_pipes.lock().is_empty());
        assert!(pending.await.unwrap().unwrap().is_empty());
        assert_eq!(fs.list(ROOT).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_paced_reads_deliver_everything() {
        let remote = MemoryRemote::new();
        remote.add_share("nas", "media").put_file("song.mp3", vec![3u8; 5000]);
        remote.pace_reads("smb://nas/media/song.mp3");
        let fs = session(&remote).await;

        let mut reader = fs.open_read("smb://nas/media/song.mp3").await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, vec![3u8; 5000]);
    }
}
