use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Process counters the engine updates as it runs. Cheap enough to bump on
/// every scan cycle; read by the `/metrics` handler under no lock since every
/// field is an atomic.
#[derive(Default)]
pub struct EngineMetrics {
    pub opportunities_detected: AtomicU64,
    pub trades_executed: AtomicU64,
    pub trades_failed: AtomicU64,
    pub circuit_breaker_trips: AtomicU64,
    pub realized_profit_cents: AtomicI64,
    pub connected: AtomicU64,
}

impl EngineMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn snapshot(&self) -> serde_json::Value {
        json!({
            "opportunities_detected": self.opportunities_detected.load(Ordering::Relaxed),
            "trades_executed": self.trades_executed.load(Ordering::Relaxed),
            "trades_failed": self.trades_failed.load(Ordering::Relaxed),
            "circuit_breaker_trips": self.circuit_breaker_trips.load(Ordering::Relaxed),
            "realized_profit_cents": self.realized_profit_cents.load(Ordering::Relaxed),
            "connected": self.connected.load(Ordering::Relaxed) != 0,
        })
    }
}

async fn metrics_handler(State(metrics): State<Arc<EngineMetrics>>) -> Json<serde_json::Value> {
    Json(metrics.snapshot())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Minimal HTTP server exposing `/metrics` and `/health`. Wiring follows the
/// same `Router` + `axum::serve` shape used for the rest of the system's
/// HTTP surfaces.
pub struct MetricsServer {
    metrics: Arc<EngineMetrics>,
}

impl MetricsServer {
    #[must_use]
    pub const fn new(metrics: Arc<EngineMetrics>) -> Self {
        Self { metrics }
    }

    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(self.metrics.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Binds to `0.0.0.0:{port}` and serves until the process exits.
    ///
    /// # Errors
    /// Returns an error if the port cannot be bound.
    pub async fn serve(self, port: u16) -> anyhow::Result<()> {
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "metrics server listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() {
        let metrics = EngineMetrics::new();
        metrics.opportunities_detected.fetch_add(3, Ordering::Relaxed);
        metrics.realized_profit_cents.fetch_add(-50, Ordering::Relaxed);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["opportunities_detected"], 3);
        assert_eq!(snapshot["realized_profit_cents"], -50);
        assert_eq!(snapshot["connected"], false);
    }
}
