//! WebSocket support for deployed contexts
//!
//! A context maps endpoints with [`ApplicationContext::websocket`]; the
//! upgrade only succeeds when the host has installed [`WebSocketSupport`]
//! on the request, which it does for every deployed context.
//!
//! [`ApplicationContext::websocket`]: crate::ApplicationContext::websocket

use std::future::Future;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        FromRequestParts, Request,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// WebSocket settings applied to every upgrade on a deployed context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketSupport {
    /// Largest accepted message in bytes
    pub max_message_size: usize,
    /// Largest accepted frame in bytes
    pub max_frame_size: usize,
    /// Sub-protocols offered during the handshake, in preference order
    pub protocols: Vec<String>,
}

impl Default for WebSocketSupport {
    fn default() -> Self {
        Self {
            max_message_size: 64 << 20,
            max_frame_size: 16 << 20,
            protocols: Vec::new(),
        }
    }
}

impl WebSocketSupport {
    /// Offer the given sub-protocols during the handshake
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    fn configure(&self, ws: WebSocketUpgrade) -> WebSocketUpgrade {
        let ws = ws
            .max_message_size(self.max_message_size)
            .max_frame_size(self.max_frame_size);
        if self.protocols.is_empty() {
            ws
        } else {
            ws.protocols(self.protocols.clone())
        }
    }
}

/// Handles an upgraded WebSocket session
///
/// Implemented for any `Fn(WebSocket) -> impl Future<Output = ()>` closure.
pub trait WebSocketHandler: Clone + Send + Sync + 'static {
    fn handle(&self, socket: WebSocket) -> impl Future<Output = ()> + Send;
}

impl<F, Fut> WebSocketHandler for F
where
    F: Fn(WebSocket) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn handle(&self, socket: WebSocket) -> impl Future<Output = ()> + Send {
        self(socket)
    }
}

/// Resolves once the server hosting a session is stopping
#[derive(Clone)]
pub(crate) struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    pub(crate) async fn wait(mut self) {
        // A dropped sender also means the server is gone
        let _ = self.0.wait_for(|stopping| *stopping).await;
    }
}

/// Build the GET route that upgrades requests on `path`
pub(crate) fn endpoint<H: WebSocketHandler>(path: &str, handler: H) -> MethodRouter {
    let path = path.to_string();
    get(move |request: Request| upgrade(path, handler, request))
}

/// Handle WebSocket upgrade
async fn upgrade<H: WebSocketHandler>(path: String, handler: H, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();

    let Some(support) = parts.extensions.get::<WebSocketSupport>().cloned() else {
        warn!(%path, "rejecting upgrade: WebSocket support not installed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "WebSocket support not installed",
        )
            .into_response();
    };
    let shutdown = parts.extensions.get::<ShutdownSignal>().cloned();

    let ws = match <WebSocketUpgrade as FromRequestParts<()>>::from_request_parts(&mut parts, &())
        .await
    {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(%path, %rejection, "rejecting non-upgrade request");
            return rejection.into_response();
        }
    };

    support
        .configure(ws)
        .on_upgrade(move |socket| handle_socket(path, handler, socket, shutdown))
}

/// Run the handler for one session, ending it early if the server stops
async fn handle_socket<H: WebSocketHandler>(
    path: String,
    handler: H,
    socket: WebSocket,
    shutdown: Option<ShutdownSignal>,
) {
    info!(%path, "WebSocket connected");

    match shutdown {
        Some(signal) => {
            tokio::select! {
                _ = handler.handle(socket) => {}
                _ = signal.wait() => {
                    debug!(%path, "closing WebSocket session on shutdown");
                }
            }
        }
        None => handler.handle(socket).await,
    }

    info!(%path, "WebSocket disconnected");
}
