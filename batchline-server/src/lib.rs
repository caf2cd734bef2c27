//! Transports for the Batchline RPC session core: an axum server exposing
//! the HTTP batch endpoint, the WebSocket endpoint and optional static file
//! routes, plus logging setup.

pub mod config;
pub mod logging;
pub mod server;

pub use config::ServerConfig;
pub use logging::{init_logging, init_test_logging, session_span};
pub use server::RpcServer;
