//! Host - the root service every connection is dispatched through
//!
//! Holds at most one deployed context. The root router has no routes of its
//! own; its fallback forwards each request to the deployed context's router
//! after installing WebSocket support and the shutdown signal on it. With
//! nothing deployed every request is answered with 404.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use parking_lot::RwLock;
use tokio::sync::watch;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::deployment::Deployment;
use crate::error::{Result, ServerError};
use crate::websocket::{ShutdownSignal, WebSocketSupport};

enum ContextState {
    /// Initializers waiting for the server to start
    Pending(Deployment),
    Active(Router),
}

struct DeployedContext {
    name: String,
    websocket: WebSocketSupport,
    state: ContextState,
}

impl DeployedContext {
    /// Run pending initializers; no-op once active
    fn activate(&mut self, doc_root: &Path) -> Result<()> {
        let state = std::mem::replace(&mut self.state, ContextState::Active(Router::new()));
        match state {
            ContextState::Pending(deployment) => {
                self.state = ContextState::Active(deployment.build(doc_root)?);
                info!(context = %self.name, "context started");
            }
            active => self.state = active,
        }
        Ok(())
    }
}

/// The embedded container's host
pub(crate) struct Host {
    context: RwLock<Option<DeployedContext>>,
    websocket: WebSocketSupport,
    shutdown: watch::Sender<bool>,
}

impl Host {
    pub(crate) fn new(websocket: WebSocketSupport) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            context: RwLock::new(None),
            websocket,
            shutdown,
        }
    }

    /// Register a deployment
    ///
    /// With `running` set to the document root, initializers run
    /// immediately; otherwise they wait for [`Host::activate`]. The router
    /// is built before the host lock is taken so requests keep flowing
    /// while initializers run.
    pub(crate) fn deploy(&self, deployment: Deployment, running: Option<&Path>) -> Result<()> {
        if let Some(existing) = self.deployed_name() {
            return Err(ServerError::AlreadyDeployed(existing));
        }

        let name = deployment.name().to_string();
        let state = match (deployment, running) {
            (Deployment::Context(ctx), _) => ContextState::Active(ctx.into_router()),
            (pending, Some(doc_root)) => {
                let router = pending.build(doc_root)?;
                info!(context = %name, "context started");
                ContextState::Active(router)
            }
            (pending, None) => ContextState::Pending(pending),
        };

        // WebSocket support goes on before the context is published
        let context = DeployedContext {
            name,
            websocket: self.websocket.clone(),
            state,
        };

        let mut slot = self.context.write();
        if let Some(existing) = slot.as_ref() {
            return Err(ServerError::AlreadyDeployed(existing.name.clone()));
        }
        info!(context = %context.name, "context deployed");
        *slot = Some(context);
        Ok(())
    }

    fn deployed_name(&self) -> Option<String> {
        self.context.read().as_ref().map(|context| context.name.clone())
    }

    /// Detach the deployed context, returning its name
    pub(crate) fn undeploy(&self) -> Option<String> {
        let removed = self.context.write().take().map(|context| context.name);
        match &removed {
            Some(name) => info!(context = %name, "context undeployed"),
            None => debug!("undeploy requested with nothing deployed"),
        }
        removed
    }

    /// Start the deployed context, if any
    ///
    /// A context whose initializers fail is undeployed.
    pub(crate) fn activate(&self, doc_root: &Path) -> Result<()> {
        let mut slot = self.context.write();
        let Some(context) = slot.as_mut() else {
            return Ok(());
        };

        if let Err(e) = context.activate(doc_root) {
            warn!(context = %context.name, error = %e, "context failed to start");
            *slot = None;
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn is_deployed(&self) -> bool {
        self.context.read().is_some()
    }

    /// Reset the shutdown signal before serving
    pub(crate) fn arm(&self) {
        self.shutdown.send_replace(false);
    }

    pub(crate) fn signal_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub(crate) fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.shutdown.subscribe())
    }

    /// The root router served on the connector
    pub(crate) fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Router and WebSocket support of the active context
    fn current(&self) -> Option<(Router, WebSocketSupport)> {
        match self.context.read().as_ref() {
            Some(DeployedContext {
                websocket,
                state: ContextState::Active(router),
                ..
            }) => Some((router.clone(), websocket.clone())),
            _ => None,
        }
    }
}

/// Forward a request to the deployed context
async fn dispatch(State(host): State<Arc<Host>>, mut request: Request) -> Response {
    let Some((router, websocket)) = host.current() else {
        debug!(path = %request.uri().path(), "no context deployed");
        return StatusCode::NOT_FOUND.into_response();
    };

    request.extensions_mut().insert(websocket);
    request.extensions_mut().insert(host.shutdown_signal());

    match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
