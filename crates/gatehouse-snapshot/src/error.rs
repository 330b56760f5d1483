use std::path::PathBuf;

use gatehouse_store::RemoteError;

/// Snapshot lifecycle errors.
///
/// None of these is fatal to the process: the restorer and the backup
/// worker log them and move on.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("remote storage error: {0}")]
    Remote(#[from] RemoteError),

    #[error("archive {path} failed: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("local state error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for SnapshotError {
    fn from(e: tokio::task::JoinError) -> Self {
        SnapshotError::Task(e.to_string())
    }
}
