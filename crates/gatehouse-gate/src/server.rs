//! HTTP surface of the gate.
//!
//! - `GET /auth?key=<secret>` mints the capability cookie
//! - every other request (including non-GET `/auth`) is classified:
//!   allowed → proxied, blocked → decoy

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, DefaultBodyLimit, RawQuery, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::decision::{AccessDecision, GatePolicy};
use crate::proxy::Upstream;
use crate::token::{
    TokenGrant, TokenIssuer, AUTH_PATH, AUTH_QUERY_KEY, COOKIE_MAX_AGE, COOKIE_NAME, DENIED_BODY,
};

/// Default body of the decoy response.
pub const DEFAULT_DECOY_BODY: &str = "Site under maintenance. Please check back later.";

/// Everything the gate needs, assembled once at startup.
#[derive(Debug)]
pub struct GateConfig {
    pub policy: GatePolicy,
    pub issuer: TokenIssuer,
    pub upstream: SocketAddr,
    pub decoy_body: String,
}

impl GateConfig {
    /// Default rules and decoy for `secret` in front of `upstream`.
    pub fn new(secret: impl Into<String>, upstream: SocketAddr) -> Self {
        Self {
            policy: GatePolicy::default(),
            issuer: TokenIssuer::new(secret),
            upstream,
            decoy_body: DEFAULT_DECOY_BODY.to_string(),
        }
    }

    pub fn policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn decoy_body(mut self, body: impl Into<String>) -> Self {
        self.decoy_body = body.into();
        self
    }

    /// Structured, secret-free view of the effective gate rules.
    pub fn summary(&self) -> GateSummary<'_> {
        GateSummary {
            auth_path: AUTH_PATH,
            auth_query_key: AUTH_QUERY_KEY,
            cookie_name: COOKIE_NAME,
            cookie_max_age_secs: COOKIE_MAX_AGE.as_secs(),
            secret: "<redacted>",
            policy: &self.policy,
            upstream: self.upstream,
            decoy_body: &self.decoy_body,
        }
    }
}

/// Rendering of a [`GateConfig`] for operators. Never contains the secret.
#[derive(Debug, Serialize)]
pub struct GateSummary<'a> {
    pub auth_path: &'static str,
    pub auth_query_key: &'static str,
    pub cookie_name: &'static str,
    pub cookie_max_age_secs: u64,
    pub secret: &'static str,
    pub policy: &'a GatePolicy,
    pub upstream: SocketAddr,
    pub decoy_body: &'a str,
}

struct Inner {
    policy: GatePolicy,
    issuer: TokenIssuer,
    upstream: Upstream,
    decoy_body: String,
}

/// Shared, immutable gate state.
#[derive(Clone)]
pub struct GateState {
    inner: Arc<Inner>,
}

impl GateState {
    pub fn new(config: GateConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                policy: config.policy,
                issuer: config.issuer,
                upstream: Upstream::new(config.upstream),
                decoy_body: config.decoy_body,
            }),
        }
    }
}

pub fn router(state: GateState) -> Router {
    Router::new()
        .route(AUTH_PATH, get(issue_token).fallback(gated))
        .fallback(gated)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gate on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: GateState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, upstream = %state.inner.upstream.addr(), "gate listening");
    }
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn issue_token(State(state): State<GateState>, RawQuery(query): RawQuery) -> Response {
    match state.inner.issuer.issue_from_query(query.as_deref()) {
        TokenGrant::Granted { set_cookie } => {
            info!("capability cookie issued");
            (
                StatusCode::FOUND,
                [(header::LOCATION, "/".to_string()), (header::SET_COOKIE, set_cookie)],
            )
                .into_response()
        }
        TokenGrant::Denied => {
            debug!("capability cookie denied");
            (
                StatusCode::UNAUTHORIZED,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                DENIED_BODY,
            )
                .into_response()
        }
    }
}

async fn gated(
    State(state): State<GateState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    match state.inner.policy.evaluate_request(req.uri(), req.headers()) {
        AccessDecision::Block => {
            debug!(path = req.uri().path(), "request blocked");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                state.inner.decoy_body.clone(),
            )
                .into_response()
        }
        AccessDecision::Allow(rule) => {
            debug!(path = req.uri().path(), ?rule, "request allowed");
            match state.inner.upstream.forward(req, client).await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(error = %e, "upstream unavailable");
                    e.into_response()
                }
            }
        }
    }
}
