//! The HTTP surface of the operator.
//!
//! | Method | Path                            | Handler                     |
//! |--------|---------------------------------|-----------------------------|
//! | POST   | `/convert/vscodes.kubeflow.org` | [`Vscode::try_convert`]     |
//! | GET    | `/metrics`                      | Prometheus text exposition  |
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse as _, Response},
    routing::{get, post},
};
use kube::core::conversion::ConversionReview;
use prometheus::{Encoder as _, Registry, TextEncoder};
use tower_http::trace::TraceLayer;
use vscode_crd::{CRD_NAME, Vscode};

pub fn router(registry: Registry) -> Router {
    let convert_route = format!("/convert/{CRD_NAME}");

    Router::new()
        .route(&convert_route, post(convert))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn convert(Json(review): Json<ConversionReview>) -> Json<ConversionReview> {
    Json(Vscode::try_convert(review))
}

async fn metrics(State(registry): State<Registry>) -> Response {
    // Collectors list workloads synchronously, keep that off the async workers.
    let metric_families = match tokio::task::spawn_blocking(move || registry.gather()).await {
        Ok(metric_families) => metric_families,
        Err(error) => {
            tracing::error!(
                error = &error as &dyn std::error::Error,
                "failed to gather metrics"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&metric_families) {
        Ok(body) => {
            let content_type = encoder.format_type().to_owned();
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(error) => {
            tracing::error!(
                error = &error as &dyn std::error::Error,
                "failed to encode metrics"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
