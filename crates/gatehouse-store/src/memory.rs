//! In-memory [`RemoteStore`] with failure injection, for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::RemoteError;
use crate::store::{normalize, split_parent, MkdirOutcome, RemoteStore};

#[derive(Default)]
struct Inner {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    fail_list: bool,
    fail_mkdir: bool,
    /// Number of upcoming uploads that fail.
    fail_uploads: usize,
    fail_download: bool,
    fail_deletes: BTreeSet<String>,
    upload_delay: Option<Duration>,
    uploads: usize,
    deletes: Vec<String>,
}

/// Fake remote tree that records calls for verification.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn injected(op: &'static str, path: &str) -> RemoteError {
    RemoteError::Status {
        method: op,
        path: path.to_string(),
        status: 503,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a directory (and its ancestors).
    pub fn add_dir(&self, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        let mut current = String::new();
        for seg in normalize(path).split('/').filter(|s| !s.is_empty()) {
            current = crate::store::join(&current, seg);
            inner.dirs.insert(current.clone());
        }
    }

    /// Seed a file; its parent directory is created too.
    pub fn add_file(&self, path: &str, data: Vec<u8>) {
        let (parent, _) = split_parent(path);
        self.add_dir(&parent);
        self.inner.lock().unwrap().files.insert(normalize(path), data);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().files.get(&normalize(path)).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.inner.lock().unwrap().dirs.contains(&normalize(path))
    }

    /// Names of the files directly inside `dir`.
    pub fn file_names(&self, dir: &str) -> BTreeSet<String> {
        let dir = normalize(dir);
        self.inner
            .lock()
            .unwrap()
            .files
            .keys()
            .filter_map(|p| {
                let (parent, name) = split_parent(p);
                (parent == dir).then_some(name)
            })
            .collect()
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.inner.lock().unwrap().fail_list = fail;
    }

    pub fn set_fail_mkdir(&self, fail: bool) {
        self.inner.lock().unwrap().fail_mkdir = fail;
    }

    /// Make the next `count` uploads fail.
    pub fn fail_next_uploads(&self, count: usize) {
        self.inner.lock().unwrap().fail_uploads = count;
    }

    pub fn set_fail_download(&self, fail: bool) {
        self.inner.lock().unwrap().fail_download = fail;
    }

    /// Make every deletion of `path` fail.
    pub fn fail_delete_of(&self, path: &str) {
        self.inner.lock().unwrap().fail_deletes.insert(normalize(path));
    }

    /// Make every upload take `delay` before it lands.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().upload_delay = Some(delay);
    }

    /// Upload attempts so far, failed ones included.
    pub fn upload_attempts(&self) -> usize {
        self.inner.lock().unwrap().uploads
    }

    /// Paths successfully deleted, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.inner.lock().unwrap().deletes.clone()
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, path: &str) -> Result<BTreeSet<String>, RemoteError> {
        let path = normalize(path);
        let inner = self.inner.lock().unwrap();
        if inner.fail_list {
            return Err(injected("PROPFIND", &path));
        }
        if !path.is_empty() && !inner.dirs.contains(&path) {
            return Err(RemoteError::NotFound { path });
        }
        let child = |p: &String| {
            let (parent, name) = split_parent(p);
            (parent == path).then_some(name)
        };
        Ok(inner
            .dirs
            .iter()
            .filter_map(child)
            .chain(inner.files.keys().filter_map(child))
            .collect())
    }

    async fn mkdir(&self, path: &str) -> Result<MkdirOutcome, RemoteError> {
        let path = normalize(path);
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_mkdir {
            return Err(injected("MKCOL", &path));
        }
        let (parent, _) = split_parent(&path);
        if !parent.is_empty() && !inner.dirs.contains(&parent) {
            return Err(RemoteError::Status {
                method: "MKCOL",
                path,
                status: 409,
            });
        }
        if inner.dirs.insert(path) {
            Ok(MkdirOutcome::Created)
        } else {
            Ok(MkdirOutcome::AlreadyExists)
        }
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let data = tokio::fs::read(local).await?;
        let remote = normalize(remote);
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.uploads += 1;
            inner.upload_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_uploads > 0 {
            inner.fail_uploads -= 1;
            return Err(injected("PUT", &remote));
        }
        let (parent, _) = split_parent(&remote);
        if !parent.is_empty() && !inner.dirs.contains(&parent) {
            return Err(RemoteError::Status {
                method: "PUT",
                path: remote,
                status: 409,
            });
        }
        inner.files.insert(remote, data);
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        let remote = normalize(remote);
        let data = {
            let inner = self.inner.lock().unwrap();
            if inner.fail_download {
                return Err(injected("GET", &remote));
            }
            inner
                .files
                .get(&remote)
                .cloned()
                .ok_or(RemoteError::NotFound { path: remote })?
        };
        tokio::fs::write(local, data).await?;
        Ok(())
    }

    async fn delete(&self, remote: &str) -> Result<(), RemoteError> {
        let remote = normalize(remote);
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_deletes.contains(&remote) {
            return Err(injected("DELETE", &remote));
        }
        if inner.files.remove(&remote).is_none() {
            return Err(RemoteError::NotFound { path: remote });
        }
        inner.deletes.push(remote);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_children_only() {
        let store = MemoryStore::new();
        store.add_file("backups/a.tar.gz", vec![1]);
        store.add_file("backups/deep/b.tar.gz", vec![2]);
        store.add_dir("other");

        let root = store.list("/").await.unwrap();
        assert_eq!(root.into_iter().collect::<Vec<_>>(), vec!["backups", "other"]);

        let backups = store.list("backups").await.unwrap();
        assert_eq!(backups.into_iter().collect::<Vec<_>>(), vec!["a.tar.gz", "deep"]);
    }

    #[tokio::test]
    async fn list_missing_dir_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.list("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(store.ensure_dir("backups").await.unwrap(), MkdirOutcome::Created);
        assert_eq!(
            store.ensure_dir("backups").await.unwrap(),
            MkdirOutcome::AlreadyExists
        );
        assert_eq!(store.mkdir("backups").await.unwrap(), MkdirOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn ensure_dir_creates_missing_ancestors() {
        let store = MemoryStore::new();
        assert_eq!(
            store.ensure_dir("/srv/backups/files/").await.unwrap(),
            MkdirOutcome::Created
        );
        assert!(store.has_dir("srv"));
        assert!(store.has_dir("srv/backups"));
        assert!(store.has_dir("srv/backups/files"));

        // Partially present: only the tail is created.
        store.add_dir("srv/other");
        assert_eq!(
            store.ensure_dir("srv/other/deep").await.unwrap(),
            MkdirOutcome::Created
        );
        assert_eq!(
            store.ensure_dir("srv/backups/files").await.unwrap(),
            MkdirOutcome::AlreadyExists
        );
        // The root needs nothing.
        assert_eq!(store.ensure_dir("/").await.unwrap(), MkdirOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn dir_exists_scans_parent() {
        let store = MemoryStore::new();
        store.add_dir("srv/backups");
        assert!(store.dir_exists("srv/backups").await.unwrap());
        assert!(!store.dir_exists("srv/missing").await.unwrap());
        // Parent missing too: still just "absent".
        assert!(!store.dir_exists("nope/backups").await.unwrap());
    }

    #[tokio::test]
    async fn dir_exists_propagates_real_failures() {
        let store = MemoryStore::new();
        store.set_fail_list(true);
        assert!(store.dir_exists("backups").await.is_err());
    }

    #[tokio::test]
    async fn upload_download_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.bin");
        let dst = tmp.path().join("dst.bin");
        tokio::fs::write(&src, b"payload").await.unwrap();

        let store = MemoryStore::new();
        store.add_dir("backups");
        store.upload(&src, "backups/x").await.unwrap();
        store.download("backups/x", &dst).await.unwrap();
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"payload");

        store.delete("backups/x").await.unwrap();
        assert!(store.file("backups/x").is_none());
        assert!(store.delete("backups/x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn injected_upload_failure_is_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.bin");
        tokio::fs::write(&src, b"x").await.unwrap();

        let store = MemoryStore::new();
        store.add_dir("b");
        store.fail_next_uploads(1);
        assert!(store.upload(&src, "b/1").await.is_err());
        assert!(store.upload(&src, "b/2").await.is_ok());
        assert_eq!(store.upload_attempts(), 2);
        assert_eq!(store.file_names("b").len(), 1);
    }
}
