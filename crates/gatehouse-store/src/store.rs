use std::collections::BTreeSet;
use std::path::Path;

use crate::error::RemoteError;

/// Result of a directory creation request.
///
/// An existing directory is a success, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MkdirOutcome {
    Created,
    AlreadyExists,
}

/// Directory-oriented remote storage.
///
/// In production: [`WebDavStore`](crate::WebDavStore).
/// In tests: [`MemoryStore`](crate::MemoryStore) (feature `test-utils`).
///
/// Paths are `/`-separated and relative to the store's root; leading and
/// trailing slashes are ignored.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Names of the direct children of `path`, ordered.
    async fn list(&self, path: &str) -> Result<BTreeSet<String>, RemoteError>;

    /// Create the directory at `path`.
    async fn mkdir(&self, path: &str) -> Result<MkdirOutcome, RemoteError>;

    /// Upload the local file at `local` to `remote`, replacing any existing file.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError>;

    /// Download `remote` into the local file at `local`.
    async fn download(&self, remote: &str, local: &Path) -> Result<(), RemoteError>;

    /// Delete the file at `remote`.
    async fn delete(&self, remote: &str) -> Result<(), RemoteError>;

    /// Whether the directory `path` exists.
    ///
    /// Lists the parent and scans for the name instead of asking the remote
    /// directly: some providers answer existence queries unreliably.
    async fn dir_exists(&self, path: &str) -> Result<bool, RemoteError> {
        let (parent, name) = split_parent(path);
        if name.is_empty() {
            // The root always exists.
            return Ok(true);
        }
        match self.list(&parent).await {
            Ok(names) => Ok(names.contains(&name)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create `path` and any missing ancestors, root first.
    ///
    /// Reports the outcome for `path` itself.
    async fn ensure_dir(&self, path: &str) -> Result<MkdirOutcome, RemoteError> {
        let mut outcome = MkdirOutcome::AlreadyExists;
        let mut current = String::new();
        for segment in normalize(path).split('/').filter(|s| !s.is_empty()) {
            current = join(&current, segment);
            outcome = if self.dir_exists(&current).await? {
                MkdirOutcome::AlreadyExists
            } else {
                self.mkdir(&current).await?
            };
        }
        Ok(outcome)
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────

/// Strip leading/trailing slashes and collapse empty segments.
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    let dir = normalize(dir);
    let name = normalize(name);
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name,
        (_, true) => dir,
        _ => format!("{dir}/{name}"),
    }
}

/// Split a path into (parent, last segment). The root splits into ("", "").
pub fn split_parent(path: &str) -> (String, String) {
    let path = normalize(path);
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => (String::new(), path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_slashes() {
        assert_eq!(normalize("/backups/"), "backups");
        assert_eq!(normalize("a//b/"), "a/b");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn join_handles_empty_parts() {
        assert_eq!(join("", "x.tar.gz"), "x.tar.gz");
        assert_eq!(join("/backups/", "x.tar.gz"), "backups/x.tar.gz");
        assert_eq!(join("backups", ""), "backups");
    }

    #[test]
    fn split_parent_cases() {
        assert_eq!(split_parent("backups"), ("".into(), "backups".into()));
        assert_eq!(
            split_parent("/srv/backups/"),
            ("srv".into(), "backups".into())
        );
        assert_eq!(split_parent(""), ("".into(), "".into()));
    }
}
