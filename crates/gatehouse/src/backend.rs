//! Optional launcher for the backend file service.
//!
//! The binary is checked before anything else happens and started only
//! after restore has finished. It is not supervised: if it exits, the gate
//! keeps answering and proxied requests get 502.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::info;

use crate::config::ConfigError;

/// Make sure `path` names an existing regular file.
pub fn verify(path: &Path) -> Result<PathBuf, ConfigError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(path.to_path_buf()),
        _ => Err(ConfigError::BackendMissing {
            path: path.to_path_buf(),
        }),
    }
}

/// Start the backend. The child is killed when the handle is dropped.
pub fn spawn(bin: &Path, args: &[String]) -> std::io::Result<Child> {
    let child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    info!(bin = %bin.display(), pid = child.id(), "backend started");
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::BackendMissing { .. }));
        assert!(err.to_string().contains("does not exist or is not a file"));
    }

    #[test]
    fn directory_is_not_a_binary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verify(dir.path()).is_err());
    }

    #[test]
    fn regular_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("backend");
        std::fs::write(&bin, b"#!/bin/sh\n").unwrap();
        assert_eq!(verify(&bin).unwrap(), bin);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawned_backend_runs() {
        let mut child = spawn(
            Path::new("/bin/sh"),
            &["-c".to_string(), "exit 3".to_string()],
        )
        .unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
