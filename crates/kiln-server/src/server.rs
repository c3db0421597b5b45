//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::livereload::{client_script, inject_client, LiveReload, ReloadMessage, SCRIPT_PATH, SOCKET_PATH};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory to serve
    pub root: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Inject the live reload client into HTML pages
    pub live_reload: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("build"),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
            live_reload: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}: {1}")]
    AddressError(String, String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Server error: {0}")]
    Serve(String),
}

/// Static file server over the output directory.
pub struct DevServer {
    config: DevServerConfig,
    hub: LiveReload,
}

impl DevServer {
    /// Create a server that pushes messages received on `hub` to browsers.
    pub fn new(config: DevServerConfig, hub: LiveReload) -> Self {
        Self { config, hub }
    }

    /// Build the router without binding.
    pub fn router(&self) -> Router {
        let mut app = Router::new()
            .route(SOCKET_PATH, get(ws_handler))
            .route(SCRIPT_PATH, get(script_handler))
            .fallback_service(ServeDir::new(&self.config.root))
            .with_state(self.hub.clone());

        if self.config.live_reload {
            app = app.layer(middleware::from_fn(inject_livereload));
        }

        app.layer(CorsLayer::permissive())
    }

    /// Start the server. Runs until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ServerError::AddressError(
                    format!("{}:{}", self.config.host, self.config.port),
                    e.to_string(),
                )
            })?;

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        tracing::info!(
            "Serving {} at http://{}",
            self.config.root.display(),
            addr
        );

        // Open browser if configured
        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        Ok(())
    }
}

/// Add the live reload client to successful HTML responses.
async fn inject_livereload(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false);

    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(html))
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<LiveReload>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

/// Forward reload messages to one browser until it disconnects.
async fn handle_ws(mut socket: WebSocket, hub: LiveReload) {
    let mut rx = hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload client skipped {} messages", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live reload client script.
async fn script_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], client_script())
}
