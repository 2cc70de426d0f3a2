//! Deployment styles
//!
//! A server is configured either with an already-built
//! [`ApplicationContext`] or with a list of [`WebInitializer`] callbacks
//! that build one when the context starts. The two styles are mutually
//! exclusive, so they are variants of a single [`Deployment`].

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;
use tracing::debug;

use crate::context::ApplicationContext;
use crate::error::{Result, ServerError};

/// Name given to contexts built by initializers
pub const ROOT_CONTEXT: &str = "ROOT";

/// Registration callback run when an initializer-based context starts
pub trait WebInitializer: Send + Sync + 'static {
    /// Register routes, endpoints and beans on the starting context
    fn on_startup(&self, ctx: &mut ApplicationContext) -> anyhow::Result<()>;

    /// Lower values run first; ties keep registration order
    fn order(&self) -> i32 {
        0
    }

    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> WebInitializer for F
where
    F: Fn(&mut ApplicationContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_startup(&self, ctx: &mut ApplicationContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Ordered collection of initializers for a single deployment
#[derive(Default)]
pub struct Initializers {
    list: Vec<Box<dyn WebInitializer>>,
}

impl Initializers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an initializer
    pub fn with(mut self, initializer: impl WebInitializer) -> Self {
        self.list.push(Box::new(initializer));
        self
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// What to deploy on a server
pub enum Deployment {
    /// A fully wired context mapped at the root path
    Context(ApplicationContext),
    /// Initializers run at context startup, behind a static-file fallback
    Initializers(Initializers),
}

impl Deployment {
    /// Deployment of a single initializer
    pub fn initializer(initializer: impl WebInitializer) -> Self {
        Deployment::Initializers(Initializers::new().with(initializer))
    }

    /// Name of the context this deployment produces
    pub fn name(&self) -> &str {
        match self {
            Deployment::Context(ctx) => ctx.name(),
            Deployment::Initializers(_) => ROOT_CONTEXT,
        }
    }

    /// Build the root router; static files are served from `doc_root`
    pub(crate) fn build(self, doc_root: &Path) -> Result<Router> {
        match self {
            Deployment::Context(ctx) => Ok(ctx.into_router()),
            Deployment::Initializers(Initializers { mut list }) => {
                list.sort_by_key(|initializer| initializer.order());

                let mut ctx = ApplicationContext::new(ROOT_CONTEXT);
                for initializer in &list {
                    debug!(initializer = initializer.name(), "running initializer");
                    initializer
                        .on_startup(&mut ctx)
                        .map_err(|e| ServerError::Initializer {
                            name: initializer.name().to_string(),
                            source: e.into(),
                        })?;
                }

                Ok(ctx.into_router().fallback_service(ServeDir::new(doc_root)))
            }
        }
    }
}

impl From<ApplicationContext> for Deployment {
    fn from(ctx: ApplicationContext) -> Self {
        Deployment::Context(ctx)
    }
}

impl From<Initializers> for Deployment {
    fn from(initializers: Initializers) -> Self {
        Deployment::Initializers(initializers)
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Deployment::Context(ctx) => f.debug_tuple("Context").field(ctx).finish(),
            Deployment::Initializers(initializers) => f
                .debug_tuple("Initializers")
                .field(&initializers.list.iter().map(|i| i.name()).collect::<Vec<_>>())
                .finish(),
        }
    }
}
