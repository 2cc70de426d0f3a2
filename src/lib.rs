//! lodge-test-server - embedded HTTP/WebSocket server for integration tests
//!
//! Boots an axum server in-process on a fixed port, deploys an application
//! context (or a set of initializers) with WebSocket support installed, and
//! exposes start/stop/deploy/undeploy so tests can drive real WebSocket
//! endpoints over TCP.

pub mod config;
pub mod context;
pub mod deployment;
pub mod error;
mod host;
pub mod server;
pub mod telemetry;
pub mod websocket;

pub use config::ServerConfig;
pub use context::ApplicationContext;
pub use deployment::{Deployment, Initializers, WebInitializer};
pub use error::{Result, ServerError};
pub use server::ServerHandle;
pub use websocket::{WebSocketHandler, WebSocketSupport};
