//! WebDAV implementation of [`RemoteStore`].
//!
//! PROPFIND (Depth 1) for listing, MKCOL, PUT, GET and DELETE. Every request
//! carries basic auth and is bounded by the configured timeout.

use std::collections::BTreeSet;
use std::path::Path;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::config::WebDavConfig;
use crate::error::RemoteError;
use crate::store::{normalize, MkdirOutcome, RemoteStore};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

/// A WebDAV server acting as the snapshot store.
pub struct WebDavStore {
    config: WebDavConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for WebDavStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavStore")
            .field("base_url", &self.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl WebDavStore {
    /// Build the HTTP client for `config`.
    pub fn new(config: WebDavConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Config(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &WebDavConfig {
        &self.config
    }

    /// Absolute URL of `path`. Directories get a trailing slash.
    fn url_for(&self, path: &str, dir: bool) -> Result<Url, RemoteError> {
        let path = normalize(path);
        let mut encoded = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        if dir && !encoded.is_empty() {
            encoded.push('/');
        }
        self.config
            .base_url
            .join(&encoded)
            .map_err(|e| RemoteError::Config(format!("{path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        if self.config.username.is_empty() {
            builder
        } else {
            builder.basic_auth(
                &self.config.username,
                Some(self.config.password.expose_secret()),
            )
        }
    }

    async fn send(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        builder
            .send()
            .await
            .map_err(|e| RemoteError::from_reqwest(path, e))
    }
}

fn dav_method(name: &'static str) -> Result<Method, RemoteError> {
    Method::from_bytes(name.as_bytes()).map_err(|e| RemoteError::Config(e.to_string()))
}

fn check_status(method: &'static str, path: &str, status: StatusCode) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound {
            path: path.to_string(),
        });
    }
    Err(RemoteError::Status {
        method,
        path: path.to_string(),
        status: status.as_u16(),
    })
}

#[async_trait::async_trait]
impl RemoteStore for WebDavStore {
    async fn list(&self, path: &str) -> Result<BTreeSet<String>, RemoteError> {
        let url = self.url_for(path, true)?;
        let builder = self
            .request(dav_method("PROPFIND")?, url.clone())
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY);
        let resp = self.send(path, builder).await?;
        check_status("PROPFIND", path, resp.status())?;

        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::from_reqwest(path, e))?;
        let hrefs = parse_hrefs(&body)?;
        let names = child_names(&url, &hrefs);
        debug!(path, count = names.len(), "listed remote directory");
        Ok(names)
    }

    async fn mkdir(&self, path: &str) -> Result<MkdirOutcome, RemoteError> {
        let url = self.url_for(path, true)?;
        let resp = self.send(path, self.request(dav_method("MKCOL")?, url)).await?;
        match resp.status() {
            // 405: the collection is already there.
            StatusCode::METHOD_NOT_ALLOWED => Ok(MkdirOutcome::AlreadyExists),
            status => {
                check_status("MKCOL", path, status)?;
                Ok(MkdirOutcome::Created)
            }
        }
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let file = tokio::fs::File::open(local).await?;
        let len = file.metadata().await?.len();
        let url = self.url_for(remote, false)?;
        let builder = self
            .request(Method::PUT, url)
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::from(file));
        let resp = self.send(remote, builder).await?;
        check_status("PUT", remote, resp.status())?;
        debug!(remote, bytes = len, "uploaded file");
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        let url = self.url_for(remote, false)?;
        let mut resp = self.send(remote, self.request(Method::GET, url)).await?;
        check_status("GET", remote, resp.status())?;

        let mut file = tokio::fs::File::create(local).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| RemoteError::from_reqwest(remote, e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        debug!(remote, bytes = written, "downloaded file");
        Ok(())
    }

    async fn delete(&self, remote: &str) -> Result<(), RemoteError> {
        let url = self.url_for(remote, false)?;
        let resp = self.send(remote, self.request(Method::DELETE, url)).await?;
        check_status("DELETE", remote, resp.status())
    }
}

// ── Multistatus parsing ──────────────────────────────────────────────────

/// Extract every `<href>` text from a PROPFIND multistatus body.
///
/// Namespace prefixes vary between servers (`d:`, `D:`, none), so elements
/// are matched by local name.
pub(crate) fn parse_hrefs(xml: &str) -> Result<Vec<String>, RemoteError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut hrefs = Vec::new();
    let mut in_href = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"href" => in_href = true,
            Event::End(e) if e.local_name().as_ref() == b"href" => in_href = false,
            Event::Text(t) if in_href => hrefs.push(t.unescape()?.into_owned()),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(hrefs)
}

/// Turn hrefs into child names, dropping the entry for the listed directory.
pub(crate) fn child_names(listed: &Url, hrefs: &[String]) -> BTreeSet<String> {
    let own = decoded_path(listed);
    hrefs
        .iter()
        .filter_map(|href| listed.join(href).ok())
        .filter_map(|url| {
            let path = decoded_path(&url);
            if path == own {
                return None;
            }
            let name = path.rsplit('/').next().unwrap_or_default();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

fn decoded_path(url: &Url) -> String {
    percent_decode_str(url.path())
        .decode_utf8_lossy()
        .trim_end_matches('/')
        .to_string()
}
