//! HTTP server lifecycle.
//!
//! Binds the listener, mounts the API routes behind a permissive CORS layer
//! and shuts down gracefully when the cancellation token fires.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use super::http_api::{api_routes, ApiState};

/// Handle to a running server.
pub struct ServerHandle {
    cancel_token: CancellationToken,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        log::info!("[http] Stopping server on {}", self.local_addr);
        self.cancel_token.cancel();
        if let Err(e) = self.task.await {
            log::error!("[http] Server task failed: {}", e);
        }
    }
}

/// Full application router.
pub fn app(state: ApiState) -> Router {
    api_routes(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

/// Bind `addr` and serve the API until `cancel_token` is cancelled.
pub async fn start_server(
    addr: SocketAddr,
    state: ApiState,
    cancel_token: CancellationToken,
) -> std::io::Result<ServerHandle> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    log::info!("[http] Server starting on http://{}", local_addr);

    let app = app(state);
    let cancel_clone = cancel_token.clone();

    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        });

        if let Err(e) = server.await {
            log::error!("[http] Server error: {}", e);
        }

        log::info!("[http] Server stopped");
    });

    Ok(ServerHandle {
        cancel_token,
        local_addr,
        task,
    })
}
