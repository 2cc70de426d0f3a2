//! ServerHandle - lifecycle of one embedded server
//!
//! A handle owns a scoped working directory, the host and, while running,
//! the task serving connections on the configured port:
//!
//! ```rust,ignore
//! let mut server = ServerHandle::new(18080)?;
//! server.deploy_config(ctx)?;
//! server.start().await?;
//! // ... exercise ws://127.0.0.1:18080/ws ...
//! server.stop().await?;
//! server.undeploy_config();
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::deployment::Deployment;
use crate::error::{Result, ServerError};
use crate::host::Host;

enum Lifecycle {
    Unstarted,
    Running {
        local_addr: SocketAddr,
        task: JoinHandle<std::io::Result<()>>,
    },
    Stopped,
}

/// An embedded HTTP/WebSocket server bound to a fixed port
pub struct ServerHandle {
    port: u16,
    config: ServerConfig,
    /// Working directory and static document root (removed on drop)
    base_dir: TempDir,
    host: Arc<Host>,
    lifecycle: Lifecycle,
}

impl ServerHandle {
    /// Create a server for `port` with the default configuration
    pub fn new(port: u16) -> Result<Self> {
        Self::with_config(port, ServerConfig::default())
    }

    /// Create a server for `port` with configuration loaded from file and environment
    pub fn from_env(port: u16) -> Result<Self> {
        Self::with_config(port, ServerConfig::load()?)
    }

    /// Create a server for `port`
    pub fn with_config(port: u16, config: ServerConfig) -> Result<Self> {
        let base_dir = tempfile::Builder::new()
            .prefix(&format!("{}.", config.work_dir_prefix))
            .suffix(&format!(".{}", port))
            .tempdir()
            .map_err(ServerError::Setup)?;
        debug!(port, base_dir = %base_dir.path().display(), "created working directory");

        let host = Arc::new(Host::new(config.websocket.clone()));

        Ok(Self {
            port,
            config,
            base_dir,
            host,
            lifecycle: Lifecycle::Unstarted,
        })
    }

    /// The port this server was constructed with
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address actually bound while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.lifecycle {
            Lifecycle::Running { local_addr, .. } => Some(*local_addr),
            _ => None,
        }
    }

    /// Working directory; initializer deployments serve static files from here
    pub fn base_dir(&self) -> &Path {
        self.base_dir.path()
    }

    /// Configuration the server was created with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// True between a successful `start()` and `stop()`
    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// True while a context is deployed
    pub fn is_deployed(&self) -> bool {
        self.host.is_deployed()
    }

    /// Deploy an application context or a set of initializers
    ///
    /// Initializers run when the server starts, or right away if it is
    /// already running. Only one deployment can be active at a time.
    pub fn deploy_config(&mut self, deployment: impl Into<Deployment>) -> Result<()> {
        let running = self.is_running().then(|| self.base_dir.path());
        self.host.deploy(deployment.into(), running)
    }

    /// Remove the deployed context; does nothing if none is deployed
    pub fn undeploy_config(&mut self) {
        self.host.undeploy();
    }

    /// Start accepting connections
    pub async fn start(&mut self) -> Result<()> {
        if let Some(addr) = self.local_addr() {
            return Err(ServerError::AlreadyStarted(addr));
        }

        let addr = SocketAddr::new(self.config.host, self.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.host.activate(self.base_dir.path())?;
        self.host.arm();

        let router = self.host.router();
        let shutdown = self.host.shutdown_signal();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.wait())
                .await
        });

        info!("test server listening on {}", local_addr);
        self.lifecycle = Lifecycle::Running { local_addr, task };
        Ok(())
    }

    /// Stop the server and release the port
    pub async fn stop(&mut self) -> Result<()> {
        let (local_addr, task) = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running { local_addr, task } => (local_addr, task),
            idle => {
                self.lifecycle = idle;
                debug!(port = self.port, "stop requested on a server that is not running");
                return Ok(());
            }
        };

        self.host.signal_shutdown();
        task.await?.map_err(ServerError::Shutdown)?;

        info!("test server on {} stopped", local_addr);
        Ok(())
    }

    /// Base HTTP URL of the running server
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.authority(), path)
    }

    /// WebSocket URL of the running server
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.authority(), path)
    }

    fn authority(&self) -> SocketAddr {
        self.local_addr()
            .unwrap_or_else(|| SocketAddr::new(self.config.host, self.port))
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("port", &self.port)
            .field("base_dir", &self.base_dir.path())
            .field("running", &self.is_running())
            .field("deployed", &self.is_deployed())
            .finish()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.is_running() {
            self.host.signal_shutdown();
        }
    }
}
