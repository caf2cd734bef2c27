// HTTP batch and WebSocket transports over the session core.
//
// Both transports live on one path, as the protocol expects: GET upgrades
// to a WebSocket carrying one message per text frame with a session per
// connection; POST is a line-delimited batch with a fresh session per
// request.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use batchline_core::{RpcSession, RpcTarget};
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::logging::session_span;

#[derive(Clone)]
struct AppState {
    target: Arc<dyn RpcTarget>,
    max_batch_size: usize,
}

/// An RPC server: one dispatcher shared across sessions, both transports,
/// optional static file routes.
pub struct RpcServer {
    config: ServerConfig,
    target: Arc<dyn RpcTarget>,
    static_routes: Vec<(String, PathBuf)>,
}

impl RpcServer {
    pub fn new(config: ServerConfig, target: Arc<dyn RpcTarget>) -> Self {
        RpcServer {
            config,
            target,
            static_routes: Vec::new(),
        }
    }

    /// Serve the files under `dir` at the URL prefix `route`. Directory
    /// requests fall back to `index.html`; paths cannot escape `dir`.
    pub fn serve_static(mut self, route: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.static_routes.push((route.into(), dir.into()));
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router, e.g. to mount it inside a larger application.
    pub fn router(&self) -> Router {
        let state = AppState {
            target: self.target.clone(),
            max_batch_size: self.config.max_batch_size,
        };

        let mut router = Router::new()
            .route("/health", get(health_check))
            .route(
                &self.config.rpc_path,
                get(handle_websocket).post(handle_batch),
            );

        for (route, dir) in &self.static_routes {
            router = router.nest_service(route.as_str(), ServeDir::new(dir));
        }

        router
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!(
            host = %self.config.host,
            port = self.config.port,
            rpc_path = %self.config.rpc_path,
            "starting batchline server"
        );

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(%addr, "listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// HTTP batch: each line is one message, processed in order against a
/// session that lives exactly as long as this request.
async fn handle_batch(State(state): State<AppState>, body: String) -> Response {
    let message_count = body.lines().filter(|line| !line.trim().is_empty()).count();
    if message_count > state.max_batch_size {
        warn!(message_count, max = state.max_batch_size, "rejecting oversized batch");
        return (StatusCode::BAD_REQUEST, "batch too large").into_response();
    }

    let responses = async {
        let session = RpcSession::new(state.target.clone());
        let responses = session.handle_batch(&body).await;
        session.close();
        responses
    }
    .instrument(session_span("http-batch", Uuid::new_v4()))
    .await;

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        responses,
    )
        .into_response()
}

async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let session_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| {
        websocket_session(socket, state).instrument(session_span("websocket", session_id))
    })
}

async fn websocket_session(socket: WebSocket, state: AppState) {
    info!("websocket connection opened");

    let session = RpcSession::new(state.target.clone());
    let (mut sender, mut receiver) = socket.split();

    while let Some(incoming) = receiver.next().await {
        let message = match incoming {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "websocket read error");
                break;
            }
        };

        match message {
            WsMessage::Text(text) => match session.handle_message(text.as_str()).await {
                Ok(Some(response)) => {
                    if let Err(err) = sender.send(WsMessage::Text(response.into())).await {
                        error!(error = %err, "failed to write response");
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "ignoring unparseable message");
                }
            },
            WsMessage::Binary(_) => {
                warn!("ignoring binary frame, the protocol is text");
            }
            WsMessage::Close(_) => break,
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }

    session.close();
    info!("websocket connection closed");
}
