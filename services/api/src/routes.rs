use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

/// Liveness, readiness and Prometheus routes next to the listing API.
pub(crate) fn with_operational_routes(api: Router) -> Router {
    api.route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use realty_listings::api_router;
    use realty_listings::store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(readiness: Arc<AtomicBool>) -> Router {
        let recorder = PrometheusBuilder::new().build_recorder();
        let state = AppState {
            readiness,
            metrics: Arc::new(recorder.handle()),
        };
        with_operational_routes(api_router(Arc::new(MemoryStore::new()))).layer(Extension(state))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024).await.expect("read body");
        (status, serde_json::from_slice(&body).expect("json payload"))
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (status, body) = get_json(app(Arc::new(AtomicBool::new(false))), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn readiness_tracks_the_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let (status, body) = get_json(app(flag.clone()), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({ "status": "initializing" }));

        flag.store(true, Ordering::Release);
        let (status, body) = get_json(app(flag), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ready" }));
    }

    #[tokio::test]
    async fn listing_api_is_mounted_alongside() {
        let (status, body) = get_json(app(Arc::new(AtomicBool::new(true))), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Real Estate Listing Platform API"));
    }

    #[tokio::test]
    async fn metrics_render_as_prometheus_text() {
        let response = app(Arc::new(AtomicBool::new(true)))
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/plain; version=0.0.4")
        );
    }
}
