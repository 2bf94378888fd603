//! Embedded HTTP server: health endpoints plus optional metrics exposition.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::metrics::MetricsSink;

pub fn build_router(sink: Arc<MetricsSink>, expose_metrics: bool) -> Router {
    let mut router: Router<Arc<MetricsSink>> = Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(ready_handler));
    if expose_metrics {
        router = router.route("/metrics", get(metrics_handler));
    }
    router.with_state(sink)
}

pub async fn serve(
    bind: String,
    sink: Arc<MetricsSink>,
    expose_metrics: bool,
) -> anyhow::Result<()> {
    let addr = normalize_bind(&bind);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind http server to {addr}"))?;
    info!(%addr, metrics = expose_metrics, "http server listening");
    axum::serve(listener, build_router(sink, expose_metrics)).await?;
    Ok(())
}

/// Accepts the `:8080` shorthand for an all-interfaces bind.
fn normalize_bind(bind: &str) -> String {
    if bind.starts_with(':') {
        format!("0.0.0.0{bind}")
    } else {
        bind.to_string()
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ready_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(sink): State<Arc<MetricsSink>>) -> Response {
    match sink.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("cannot encode metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
