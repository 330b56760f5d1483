use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::RemoteError;

/// Default per-request timeout. Archives can be large, so this is generous.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection settings for a [`WebDavStore`](crate::WebDavStore).
///
/// ```rust
/// use std::time::Duration;
/// use gatehouse_store::WebDavConfig;
///
/// let config = WebDavConfig::new("https://dav.example.com/remote.php/dav")
///     .unwrap()
///     .credentials("alice", "hunter2")
///     .timeout(Duration::from_secs(60));
/// ```
#[derive(Debug)]
pub struct WebDavConfig {
    /// Root of the remote tree. Always ends with `/`.
    pub(crate) base_url: Url,
    pub(crate) username: String,
    pub(crate) password: SecretString,
    /// Bound on every single remote call.
    pub(crate) timeout: Duration,
}

impl WebDavConfig {
    /// Create a config rooted at `base_url`, without credentials.
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let mut url =
            Url::parse(base_url).map_err(|e| RemoteError::Config(format!("{base_url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RemoteError::Config(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            username: String::new(),
            password: SecretString::from(String::new()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set basic-auth credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = SecretString::from(password.into());
        self
    }

    /// Set the per-request timeout (default: 300 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configured username (may be empty).
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = WebDavConfig::new("https://dav.example.com/dav").unwrap();
        assert_eq!(config.base_url().as_str(), "https://dav.example.com/dav/");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = WebDavConfig::new("ftp://example.com").unwrap_err();
        assert!(matches!(err, RemoteError::Config(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(WebDavConfig::new("not a url").is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let config = WebDavConfig::new("http://localhost:8080")
            .unwrap()
            .credentials("bob", "secret")
            .timeout(Duration::from_secs(5));
        assert_eq!(config.username(), "bob");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }
}
