//! HTTP surface.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | pricing payload followed by ranking payload, `application/json` |
//! | `GET /health` | reply listener status |
//! | `GET /metrics` | Prometheus text format |

use crate::service::{Gateway, TopCoins};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, info};

/// Set on a degraded response; names the source whose payload is missing.
pub const PARTIAL_HEADER: HeaderName = HeaderName::from_static("x-topcoins-partial");

/// Build the gateway router.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(handle_top_coins))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(gateway)
}

async fn handle_top_coins(State(gateway): State<Arc<Gateway>>) -> Response {
    let coins = gateway.top_coins().await;
    info!(
        complete = coins.is_complete(),
        missing = coins.missing_source().unwrap_or("none"),
        "Served top coins"
    );
    coins.into_response()
}

impl IntoResponse for TopCoins {
    fn into_response(self) -> Response {
        if self.is_empty() {
            let all_timeouts = self.errors().iter().all(|(_, e)| e.is_timeout());
            let status = if all_timeouts {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            let errors: serde_json::Map<String, serde_json::Value> = self
                .errors()
                .into_iter()
                .map(|(source, e)| (source.to_string(), e.to_string().into()))
                .collect();
            return (status, Json(serde_json::json!({ "errors": errors }))).into_response();
        }

        let json = HeaderValue::from_static("application/json");
        match self.missing_source() {
            Some(source) => (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, json),
                    (PARTIAL_HEADER, HeaderValue::from_static(source)),
                ],
                self.body(),
            )
                .into_response(),
            None => (StatusCode::OK, [(CONTENT_TYPE, json)], self.body()).into_response(),
        }
    }
}

async fn health_check(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    let caller = gateway.caller();
    let (status, label) = if caller.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "closed")
    } else {
        (StatusCode::OK, "ok")
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "pending_calls": caller.pending_count(),
        })),
    )
}

async fn metrics() -> Response {
    match topcoins_telemetry::encode_metrics() {
        Ok(text) => (
            [(CONTENT_TYPE, topcoins_telemetry::metrics_content_type())],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
