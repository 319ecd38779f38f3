use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Logs every request with method, path, status and latency. Errors get their
/// own line so they stand out in the log stream.
pub async fn track_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    let duration = start.elapsed();

    if status.is_client_error() || status.is_server_error() {
        warn!(%method, %path, %status, ?duration, "request failed");
    } else {
        info!(%method, %path, %status, ?duration, "request");
    }

    response
}
