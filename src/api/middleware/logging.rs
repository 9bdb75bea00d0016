//! Request logging middleware

use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info, warn};

/// Log method, path, status and duration of every request.
///
/// Server errors are logged at `warn`, API calls at `info`, static files at `debug`.
pub async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request failed");
    } else if path.starts_with("/api/") {
        info!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request handled");
    } else {
        debug!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request handled");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_passes_response_through() {
        let app = axum::Router::new()
            .route("/api/boom", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .layer(axum::middleware::from_fn(log_request));

        let response = app
            .oneshot(Request::builder().uri("/api/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
