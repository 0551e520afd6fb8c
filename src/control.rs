use crate::shutdown::{ShutdownSignal, Trigger};
use axum::{extract::State, http::Method, routing::any, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Router for the loopback control endpoint: a single `/shutdown` route, any method.
pub fn router(signal: ShutdownSignal) -> Router {
    Router::new()
        .route("/shutdown", any(shutdown))
        .with_state(signal)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown(State(signal): State<ShutdownSignal>, method: Method) -> &'static str {
    tracing::info!(%method, "received shutdown request via HTTP");
    signal.fire(Trigger::Http);
    "OK"
}

/// Serve the control router on `listener` until `signal` fires, then drain.
pub async fn serve(listener: TcpListener, signal: ShutdownSignal) -> std::io::Result<()> {
    let token = signal.token();
    axum::serve(listener, router(signal))
        .with_graceful_shutdown(token.cancelled_owned())
        .await
}

async fn bind_and_serve(addr: SocketAddr, signal: ShutdownSignal) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("control endpoint listening on {local_addr}");
    serve(listener, signal).await
}

/// Run the control endpoint on a background task.
///
/// A bind or serve failure is fatal: it is logged and the process exits with status 1.
pub fn spawn(addr: SocketAddr, signal: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = bind_and_serve(addr, signal).await {
            tracing::error!(%addr, error = %e, "control endpoint failed");
            std::process::exit(1);
        }
        tracing::debug!("control endpoint stopped");
    })
}
