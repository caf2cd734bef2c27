//! Logging setup and the span convention shared by the transports.

use std::io;
use std::path::Path;

use tracing::{info_span, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("batchline=debug,tower_http=info,warn"))
}

/// Console logging plus a daily-rolling log file under `log_dir`.
///
/// Returns the file writer's guard. Dropping it stops the background
/// flusher, so bind it for the life of the process.
pub fn init_logging(log_dir: impl AsRef<Path>, prefix: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir.as_ref())?;
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, prefix));

    tracing_subscriber::registry()
        .with(default_filter())
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;

    Ok(guard)
}

/// Console-only logging for tests; repeated calls are fine.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(default_filter())
        .try_init();
}

/// The span a transport enters for the whole life of one RPC session.
///
/// Every session event - open, per-message handling, close - carries the
/// same `session_id`, so a WebSocket session's messages or one HTTP batch
/// can be followed through interleaved logs.
pub fn session_span(transport: &'static str, session_id: Uuid) -> Span {
    info_span!("rpc_session", transport, %session_id)
}
