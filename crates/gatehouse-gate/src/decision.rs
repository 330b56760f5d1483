//! Access decisions: allow or block, per request.
//!
//! Pure and request-local. The rules form a monotonic union: each predicate
//! is independent, any one of them allows the request, and nothing
//! downgrades an allowed request back to blocked.
use http::header::COOKIE;
use http::{HeaderMap, Uri};
use percent_encoding::percent_decode_str;
use serde::Serialize;

use crate::token::{CapabilityToken, COOKIE_NAME};

/// Which predicate allowed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRule {
    /// Carries the capability cookie.
    CookieValid,
    /// Anonymous download / preview prefix.
    PublicPath,
    /// API, asset or favicon prefix, or a static-asset extension.
    AssetPath,
}

/// Result of classifying one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(AccessRule),
    Block,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }
}

/// Path whitelists of the gate.
///
/// ```rust
/// use gatehouse_gate::{AccessDecision, AccessRule, GatePolicy};
///
/// let policy = GatePolicy::default();
/// assert_eq!(policy.evaluate("/d/movie.mkv", []), AccessDecision::Allow(AccessRule::PublicPath));
/// assert_eq!(policy.evaluate("/admin", []), AccessDecision::Block);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatePolicy {
    public_prefixes: Vec<String>,
    asset_prefixes: Vec<String>,
    asset_extensions: Vec<String>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            public_prefixes: to_strings(&["/d/", "/p/"]),
            asset_prefixes: to_strings(&["/api/", "/assets/", "/static/", "/favicon"]),
            asset_extensions: to_strings(&[
                "js", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2",
                "ttf", "map",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl GatePolicy {
    /// Replace the anonymous download/preview prefixes.
    pub fn public_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the API/asset prefixes.
    pub fn asset_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the static-asset extensions (without the dot, case-insensitive).
    pub fn asset_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset_extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Classify a request by its URI and headers.
    pub fn evaluate_request(&self, uri: &Uri, headers: &HeaderMap) -> AccessDecision {
        let cookies = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());
        self.evaluate(uri.path(), cookies)
    }

    /// Classify a request by its raw path and `Cookie` header values.
    ///
    /// The query string never affects the decision.
    pub fn evaluate<'a, I>(&self, raw_path: &str, cookie_headers: I) -> AccessDecision
    where
        I: IntoIterator<Item = &'a str>,
    {
        let path = normalize_path(raw_path);

        let cookie_ok = has_capability_cookie(cookie_headers);
        let public_ok = self.public_prefixes.iter().any(|p| path.starts_with(p.as_str()));
        let asset_ok = self.asset_prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.has_asset_extension(&path);

        if cookie_ok {
            AccessDecision::Allow(AccessRule::CookieValid)
        } else if public_ok {
            AccessDecision::Allow(AccessRule::PublicPath)
        } else if asset_ok {
            AccessDecision::Allow(AccessRule::AssetPath)
        } else {
            AccessDecision::Block
        }
    }

    fn has_asset_extension(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self
                .asset_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}

/// Whether any `Cookie` header carries the capability token.
fn has_capability_cookie<'a, I>(cookie_headers: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    cookie_headers
        .into_iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, value)| name.trim() == COOKIE_NAME && CapabilityToken::matches(value.trim()))
}

/// Percent-decode and resolve `.`/`..` segments, so prefix checks see the
/// same path the backend will serve. `/d/../admin` becomes `/admin`.
pub fn normalize_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let mut segments: Vec<&str> = Vec::new();
    for seg in decoded.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut path = format!("/{}", segments.join("/"));
    // Keep a trailing slash so "/d/" still matches the "/d/" prefix.
    if decoded.ends_with('/') && path.len() > 1 {
        path.push('/');
    }
    path
}
