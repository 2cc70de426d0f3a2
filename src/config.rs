//! Server configuration
//!
//! Defaults, overridden by an optional `lodge-test-server.toml` and then by
//! `LODGE_TEST_SERVER_*` environment variables.

use std::net::{IpAddr, Ipv4Addr};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::websocket::WebSocketSupport;

/// Configuration file looked up in the current directory
pub const CONFIG_FILE: &str = "lodge-test-server.toml";

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "LODGE_TEST_SERVER_";

/// Embedded server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface the connector binds to
    pub host: IpAddr,
    /// Prefix of the temporary working directory
    pub work_dir_prefix: String,
    /// WebSocket support installed on every deployed context
    pub websocket: WebSocketSupport,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            work_dir_prefix: "lodge".to_string(),
            websocket: WebSocketSupport::default(),
        }
    }
}

impl ServerConfig {
    /// The layered configuration sources
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from file and environment
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// Set the bind interface
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Set the WebSocket support configuration
    pub fn with_websocket(mut self, websocket: WebSocketSupport) -> Self {
        self.websocket = websocket;
        self
    }
}
