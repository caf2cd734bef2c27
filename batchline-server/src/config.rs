use std::env;
use tracing::warn;

/// Server configuration. The core has no configuration surface of its own;
/// everything here belongs to the transports.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path serving both transports: GET upgrades to WebSocket, POST is
    /// HTTP batch.
    pub rpc_path: String,
    /// Maximum number of messages accepted in one HTTP batch.
    pub max_batch_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rpc_path: "/rpc".to_string(),
            max_batch_size: 100,
        }
    }
}

impl ServerConfig {
    /// Defaults with `HOST` and `PORT` overridden from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = env::var("HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Ok(port) = env::var("PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(%port, "ignoring unparseable PORT"),
            }
        }
        config
    }
}
