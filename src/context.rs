//! Application context - the wiring of handlers a deployment exposes
//!
//! Holds HTTP routes, WebSocket endpoints and typed "beans" that every
//! request can extract with `axum::Extension<T>`. The context is consumed
//! when it is deployed and becomes the root router of the host.

use std::collections::BTreeSet;

use axum::{
    extract::Request,
    http::Extensions,
    middleware,
    routing::MethodRouter,
    Router,
};

use crate::error::{Result, ServerError};
use crate::websocket::{self, WebSocketHandler};

/// Handler wiring for one deployed application
#[derive(Default)]
pub struct ApplicationContext {
    name: String,
    router: Router,
    mappings: BTreeSet<String>,
    beans: Extensions,
}

impl ApplicationContext {
    /// Create an empty context
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Context name, used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map an HTTP route
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> Result<&mut Self> {
        self.claim(path)?;
        self.router = std::mem::take(&mut self.router).route(path, method_router);
        Ok(self)
    }

    /// Map a WebSocket endpoint
    pub fn websocket<H: WebSocketHandler>(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.route(path, websocket::endpoint(path, handler))
    }

    /// Register a shared value, extractable by handlers as `Extension<T>`
    ///
    /// A second bean of the same type replaces the first.
    pub fn insert_bean<T>(&mut self, bean: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.beans.insert(bean);
        self
    }

    /// Look up a registered bean
    pub fn bean<T>(&self) -> Option<&T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.beans.get::<T>()
    }

    /// Paths mapped so far, sorted
    pub fn mappings(&self) -> impl Iterator<Item = &str> {
        self.mappings.iter().map(String::as_str)
    }

    fn claim(&mut self, path: &str) -> Result<()> {
        if self.mappings.insert(path.to_string()) {
            Ok(())
        } else {
            Err(ServerError::DuplicateMapping(path.to_string()))
        }
    }

    /// Consume the context into its dispatcher router
    pub(crate) fn into_router(self) -> Router {
        if self.beans.is_empty() {
            return self.router;
        }

        let beans = self.beans;
        self.router
            .layer(middleware::map_request(move |mut request: Request| {
                let beans = beans.clone();
                async move {
                    request.extensions_mut().extend(beans);
                    request
                }
            }))
    }
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("name", &self.name)
            .field("mappings", &self.mappings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::ws::WebSocket,
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Extension,
    };
    use tower::ServiceExt;

    #[derive(Clone)]
    struct Greeting(&'static str);

    #[test]
    fn test_duplicate_mapping_rejected() {
        let mut ctx = ApplicationContext::new("app");
        ctx.route("/health", get(|| async { "ok" })).unwrap();

        let err = ctx.route("/health", get(|| async { "again" })).unwrap_err();
        assert!(matches!(err, ServerError::DuplicateMapping(path) if path == "/health"));
    }

    #[test]
    fn test_websocket_claims_its_path() {
        let mut ctx = ApplicationContext::new("app");
        ctx.websocket("/ws", |_socket: WebSocket| async {}).unwrap();

        assert!(ctx.route("/ws", get(|| async { "" })).is_err());
        assert_eq!(ctx.mappings().collect::<Vec<_>>(), vec!["/ws"]);
    }

    #[test]
    fn test_bean_lookup() {
        let mut ctx = ApplicationContext::new("app");
        assert!(ctx.bean::<Greeting>().is_none());

        ctx.insert_bean(Greeting("hello"));
        assert_eq!(ctx.bean::<Greeting>().unwrap().0, "hello");
    }

    #[tokio::test]
    async fn test_beans_reach_handlers() {
        let mut ctx = ApplicationContext::new("app");
        ctx.insert_bean(Greeting("hello"))
            .route(
                "/greet",
                get(|Extension(greeting): Extension<Greeting>| async move { greeting.0 }),
            )
            .unwrap();

        let response = ctx
            .into_router()
            .oneshot(HttpRequest::get("/greet").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_websocket_endpoint_without_support_is_rejected() {
        let mut ctx = ApplicationContext::new("app");
        ctx.websocket("/ws", |_socket: WebSocket| async {}).unwrap();

        let response = ctx
            .into_router()
            .oneshot(HttpRequest::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
