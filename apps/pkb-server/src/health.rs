//! Liveness endpoint — its own tiny axum router on a separate port so a
//! process supervisor can probe it without going through the tool surfaces.

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let router = Router::new().route("/healthz", get(healthz_handler));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tracing::info!(port, "health endpoint listening");
    axum::serve(listener, router).await?;
    Ok(())
}
