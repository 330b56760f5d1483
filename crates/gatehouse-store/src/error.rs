/// Errors returned by the remote storage layer.
///
/// `NotFound` is the one benign variant: callers branch on it to treat a
/// missing directory as a fresh deployment rather than a failure.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote path not found: {path}")]
    NotFound { path: String },

    #[error("{method} {path} returned status {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },

    #[error("request to {path} timed out")]
    Timeout { path: String },

    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("local I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// Whether this error only says the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    pub(crate) fn from_reqwest(path: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout {
                path: path.to_string(),
            }
        } else {
            RemoteError::Request {
                path: path.to_string(),
                source: e,
            }
        }
    }
}

impl From<quick_xml::Error> for RemoteError {
    fn from(e: quick_xml::Error) -> Self {
        RemoteError::InvalidResponse(e.to_string())
    }
}
