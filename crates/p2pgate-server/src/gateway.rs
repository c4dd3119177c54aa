//! The proxy gateway — answers preflight requests, validates the requested
//! destination against the allowlist, upgrades the connection, dials the
//! destination, and hands both ends to the bridge.
//!
//! Route: `GET /ws?hostname=..&port=..&access_token=..` (upgrade) and
//! `OPTIONS /ws` (preflight). Every response from the route carries CORS
//! headers derived from the request's origin.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use p2pgate_core::{AccessVerifier, AllowlistHandle};

use crate::bridge::{bridge, ByteCounter};
use crate::endpoint::{TcpReader, TcpWriter, WsReader, WsWriter};

/// Shared state for the gateway route.
pub struct GatewayState {
    /// Current allowlist snapshot owner.
    pub allowlist: AllowlistHandle,
    /// Access-token verifier; `AllowAll` when no token is configured.
    pub verifier: Arc<dyn AccessVerifier>,
}

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub access_token: String,
}

/// Build the gateway router: one route, preflight + upgrade verbs.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ws", get(proxy_handler).options(preflight_handler))
        .with_state(state)
}

/// Resolve the origin the CORS headers should echo: the request's `Origin`
/// header, else one synthesized from its `Host`, else a localhost default.
fn resolve_origin(headers: &HeaderMap) -> String {
    if let Some(origin) = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| !o.is_empty())
    {
        return origin.to_string();
    }
    if let Some(host) = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
    {
        return format!("https://{host}");
    }
    "http://localhost".to_string()
}

/// Set the CORS headers on a response. The advertised methods are exactly
/// the route's real verbs.
fn apply_cors(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

/// `OPTIONS /ws` — CORS headers, empty body. Never consults the allowlist.
async fn preflight_handler(headers: HeaderMap) -> Response {
    let origin = resolve_origin(&headers);
    let mut response = StatusCode::OK.into_response();
    apply_cors(response.headers_mut(), &origin);
    response
}

/// `GET /ws` — validate, upgrade, dial, bridge.
async fn proxy_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = resolve_origin(&headers);
    debug!(origin = %origin, hostname = %query.hostname, port = %query.port, "proxy request");

    if let Err(e) = state.verifier.verify(&query.access_token) {
        warn!(hostname = %query.hostname, port = %query.port, "rejected: {e}");
        let mut response = (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        apply_cors(response.headers_mut(), &origin);
        return response;
    }

    let allowlist = state.allowlist.snapshot();
    if !allowlist.is_allowed(&query.hostname, &query.port) {
        info!(hostname = %query.hostname, port = %query.port, "destination not in masternode list");
        let mut response = (
            StatusCode::FORBIDDEN,
            format!(
                "Forbidden: '{}:{}' is not an allowed destination",
                query.hostname, query.port
            ),
        )
            .into_response();
        apply_cors(response.headers_mut(), &origin);
        return response;
    }

    let target = format!("{}:{}", query.hostname, query.port);
    // Origin policy is the CORS headers on this route; the upgrade itself
    // accepts any Origin. If the CORS enforcement is ever removed, origin
    // verification must be re-enabled here instead.
    let mut response = ws.on_upgrade(move |socket| handle_session(socket, target));
    apply_cors(response.headers_mut(), &origin);
    response
}

/// One relay session: dial the destination, then pump bytes both ways until
/// either side ends.
async fn handle_session(socket: WebSocket, target: String) {
    let stream = match TcpStream::connect(&target).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(target = %target, error = %e, "failed to connect to destination");
            let mut socket = socket;
            let _ = socket
                .send(Message::Text(
                    format!("failed to connect to {target}").into(),
                ))
                .await;
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "destination unreachable".into(),
                })))
                .await;
            return;
        }
    };

    info!(target = %target, "relay session opened");
    let counter = Arc::new(ByteCounter::default());
    let (ws_tx, ws_rx) = socket.split();
    let (tcp_rd, tcp_wr) = stream.into_split();

    bridge(
        WsReader::new(ws_rx),
        WsWriter::new(ws_tx),
        TcpReader::new(tcp_rd),
        TcpWriter::new(tcp_wr),
        counter.clone(),
    )
    .await;

    info!(target = %target, total_bytes = counter.total(), "relay session closed");
}
