use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use sender_compliance::workflows::generation::TextGenerator;
use sender_compliance::workflows::numbering::{
    numbering_router, BlobStore, ComplianceStore, NumberingLifecycle,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_numbering_routes<S, B, G>(
    lifecycle: Arc<NumberingLifecycle<S, B, G>>,
) -> axum::Router
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    numbering_router(lifecycle)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Acquire);
    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    };

    (status, Json(json!({ "status": label })))
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
    use crate::infra::{InMemoryBlobStore, InMemoryComplianceStore};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use sender_compliance::workflows::generation::GenerationError;
    use sender_compliance::workflows::numbering::LifecycleConfig;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    struct OfflineGenerator;

    impl TextGenerator for OfflineGenerator {
        fn complete(&self, _: &str, _: u32, _: f32) -> Result<String, GenerationError> {
            Err(GenerationError::NotConfigured("offline".to_string()))
        }
    }

    fn app(ready: bool) -> axum::Router {
        let lifecycle = Arc::new(NumberingLifecycle::new(
            Arc::new(InMemoryComplianceStore::seeded()),
            Arc::new(InMemoryBlobStore::new("http://localhost/files")),
            Arc::new(OfflineGenerator),
            LifecycleConfig::default(),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_numbering_routes(lifecycle).layer(Extension(state))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_tracks_the_flag() {
        let response = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lifecycle_routes_are_mounted() {
        let response = app(true)
            .oneshot(
                Request::post("/api/v1/10dlc/records")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"sender_id":1,"did":"+15155550100"}"#))
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
