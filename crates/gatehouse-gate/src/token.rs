//! The capability token and the endpoint logic that mints it.
//!
//! # Trust boundary
//!
//! The token is a **static bearer credential**: one fixed cookie value shared
//! by every holder, no per-holder identity, no server-side session store.
//! Anyone who ever captured the cookie keeps access until their copy expires
//! (30 days after minting). There is no revocation; rotating the shared
//! secret does not invalidate cookies already issued.
//!
//! Both comparisons (presented secret, presented cookie) run in constant time.
//!
//! # Query decoding
//!
//! The `key` value is read from the raw query string, not form-decoded: a
//! `+` stays a `+`. A percent-escaped spelling of the secret is accepted too
//! (`%2B` for `+`), so clients that escape reserved characters still match.

use std::time::Duration;

use percent_encoding::percent_decode_str;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Path of the token issuance endpoint.
pub const AUTH_PATH: &str = "/auth";

/// Query parameter carrying the presented secret.
pub const AUTH_QUERY_KEY: &str = "key";

/// Cookie carrying the capability token.
pub const COOKIE_NAME: &str = "access_token";

/// The single "granted" marker value.
pub const GRANTED_MARKER: &str = "verified";

/// Cookie lifetime: 30 days.
pub const COOKIE_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Body of the 401 response.
pub const DENIED_BODY: &str = "Wrong Password";

/// Byte-wise equality that does not short-circuit on the first difference.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The static capability token.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityToken;

impl CapabilityToken {
    /// Whether a cookie value grants access.
    pub fn matches(value: &str) -> bool {
        constant_time_eq(value, GRANTED_MARKER)
    }

    /// `Set-Cookie` header value for a freshly minted token.
    pub fn set_cookie() -> String {
        format!(
            "{COOKIE_NAME}={GRANTED_MARKER}; Path=/; Max-Age={}; HttpOnly",
            COOKIE_MAX_AGE.as_secs()
        )
    }
}

/// Outcome of presenting a secret to the issuance endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    /// Secret accepted: set this cookie and redirect to `/`.
    Granted { set_cookie: String },
    /// Missing or wrong secret: 401, no cookie.
    Denied,
}

/// Exchanges the shared secret for the capability token.
///
/// The secret is fixed for the process lifetime.
pub struct TokenIssuer {
    secret: SecretString,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
        }
    }

    /// Exact, case-sensitive comparison against the configured secret.
    pub fn issue(&self, presented: Option<&str>) -> TokenGrant {
        match presented {
            Some(key) if constant_time_eq(key, self.secret.expose_secret()) => TokenGrant::Granted {
                set_cookie: CapabilityToken::set_cookie(),
            },
            _ => TokenGrant::Denied,
        }
    }

    /// Look up the first `key=` pair in a raw query string and check it.
    ///
    /// The value matches either verbatim or after percent-decoding. `+` is
    /// never turned into a space.
    pub fn issue_from_query(&self, query: Option<&str>) -> TokenGrant {
        let Some(raw) = query.and_then(raw_query_value) else {
            return TokenGrant::Denied;
        };
        if let TokenGrant::Granted { set_cookie } = self.issue(Some(raw)) {
            return TokenGrant::Granted { set_cookie };
        }
        match percent_decode_str(raw).decode_utf8() {
            Ok(decoded) if decoded != raw => self.issue(Some(&*decoded)),
            _ => TokenGrant::Denied,
        }
    }
}

/// Raw value of the first [`AUTH_QUERY_KEY`] pair, if any.
fn raw_query_value(query: &str) -> Option<&str> {
    query.split('&').find_map(|pair| match pair.split_once('=') {
        Some((name, value)) if name == AUTH_QUERY_KEY => Some(value),
        None if pair == AUTH_QUERY_KEY => Some(""),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_format() {
        assert_eq!(
            CapabilityToken::set_cookie(),
            "access_token=verified; Path=/; Max-Age=2592000; HttpOnly"
        );
    }

    #[test]
    fn marker_matches_exactly() {
        assert!(CapabilityToken::matches("verified"));
        assert!(!CapabilityToken::matches("Verified"));
        assert!(!CapabilityToken::matches("verified "));
        assert!(!CapabilityToken::matches(""));
    }

    #[test]
    fn issue_correct_secret() {
        let issuer = TokenIssuer::new("s3cret");
        assert_eq!(
            issuer.issue(Some("s3cret")),
            TokenGrant::Granted {
                set_cookie: CapabilityToken::set_cookie()
            }
        );
    }

    #[test]
    fn issue_is_case_sensitive() {
        let issuer = TokenIssuer::new("s3cret");
        assert_eq!(issuer.issue(Some("S3CRET")), TokenGrant::Denied);
        assert_eq!(issuer.issue(Some("s3cre")), TokenGrant::Denied);
        assert_eq!(issuer.issue(Some("")), TokenGrant::Denied);
        assert_eq!(issuer.issue(None), TokenGrant::Denied);
    }

    #[test]
    fn query_plus_is_literal() {
        let issuer = TokenIssuer::new("a+b/c=");
        let granted =
            |q: &str| matches!(issuer.issue_from_query(Some(q)), TokenGrant::Granted { .. });

        assert!(granted("key=a+b/c="));
        assert!(granted("key=a%2Bb%2Fc%3D"));
        assert!(granted("x=1&key=a+b/c=&key=other"));
        assert!(!granted("key=a b/c="));
        assert!(!granted("key=a%20b/c="));
        assert!(!granted("key=other&key=a+b/c="));
        assert!(!granted("other=a+b/c="));
        assert!(!granted("key"));
        assert_eq!(issuer.issue_from_query(None), TokenGrant::Denied);
    }

    #[test]
    fn query_secret_with_literal_percent() {
        // "%41" must match as-is, not only as "A".
        let issuer = TokenIssuer::new("p%41ss");
        assert!(matches!(
            issuer.issue_from_query(Some("key=p%41ss")),
            TokenGrant::Granted { .. }
        ));
        assert!(matches!(
            issuer.issue_from_query(Some("key=p%2541ss")),
            TokenGrant::Granted { .. }
        ));
        assert_eq!(issuer.issue_from_query(Some("key=pAss")), TokenGrant::Denied);
    }

    #[test]
    fn debug_hides_secret() {
        let issuer = TokenIssuer::new("s3cret");
        assert!(!format!("{issuer:?}").contains("s3cret"));
    }

    #[test]
    fn constant_time_eq_lengths() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}
