//! Router construction and server host.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, body::Body, http::Request, routing::get};
use s3s_telemetry::{BuildInfo, Metrics};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::handlers::{ServerState, health, metrics, version};

/// HTTP host exposing `/metrics`, `/version` and `/health`.
pub struct MetricsServer {
    router: Router,
}

impl MetricsServer {
    /// Build the router over a shared metrics registry.
    #[must_use]
    pub fn new(registry: Metrics, build: BuildInfo) -> Self {
        let state = Arc::new(ServerState {
            metrics: registry,
            build,
        });
        let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                path = %request.uri().path()
            )
        });

        let router = Router::new()
            .route("/metrics", get(metrics))
            .route("/version", get(version))
            .route("/health", get(health))
            .with_state(state)
            .layer(trace_layer);
        Self { router }
    }

    /// Serve on `addr` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(addr = %addr, "starting metrics server");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ServerError::Serve { source })?;
        info!("metrics server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3s_telemetry::build_info;
    use std::error::Error;

    #[tokio::test]
    async fn serve_returns_after_shutdown_signal() -> Result<(), Box<dyn Error>> {
        let server = MetricsServer::new(Metrics::new()?, build_info());
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        server.serve(addr, async {}).await?;
        Ok(())
    }

    #[tokio::test]
    async fn serve_reports_bind_failures() -> Result<(), Box<dyn Error>> {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = occupied.local_addr()?;
        let server = MetricsServer::new(Metrics::new()?, build_info());
        let err = server
            .serve(addr, async {})
            .await
            .err()
            .ok_or("expected bind failure")?;
        assert!(matches!(err, ServerError::Bind { .. }));
        Ok(())
    }
}
