//! Gatehouse access gate.
//!
//! Sits in front of a loopback-bound backend and decides, per request,
//! whether to proxy or to answer with a decoy page:
//!
//! - [`TokenIssuer`]: `/auth?key=<secret>` mints the capability cookie
//! - [`GatePolicy`]: cookie, public-share prefixes, asset paths
//! - [`Upstream`]: streaming reverse proxy with forwarding headers
//! - [`router`] / [`serve`]: the axum surface tying them together
pub mod decision;
pub mod error;
pub mod proxy;
pub mod server;
pub mod token;

pub use decision::{normalize_path, AccessDecision, AccessRule, GatePolicy};
pub use error::GateError;
pub use proxy::{add_forwarding_headers, Upstream, X_FORWARDED_FOR, X_FORWARDED_PROTO, X_REAL_IP};
pub use server::{router, serve, GateConfig, GateState, GateSummary, DEFAULT_DECOY_BODY};
pub use token::{
    constant_time_eq, CapabilityToken, TokenGrant, TokenIssuer, AUTH_PATH, AUTH_QUERY_KEY,
    COOKIE_MAX_AGE, COOKIE_NAME, DENIED_BODY, GRANTED_MARKER,
};
