//! Request telemetry as an actix `Transform` service.
//!
//! One middleware covers both concerns this service has:
//! - structured start/completion logs for every request
//! - per-endpoint counters and durations in [`AppState`]
//!
//! Metrics are keyed by a normalized endpoint label rather than the raw
//! request path, so unknown paths (scanners, typos) cannot grow the
//! metrics map without bound.

use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{info, warn};

/// Routes this service actually serves. Anything else is lumped together
/// under a single label.
const KNOWN_ROUTES: &[&str] = &[
    "/transcribe",
    "/upload",
    "/chat",
    "/health",
    "/api/v1/health",
    "/api/v1/metrics",
];

/// Normalize a request into a metrics key like `"POST /chat"`.
fn endpoint_label(method: &str, path: &str) -> String {
    if KNOWN_ROUTES.contains(&path) {
        format!("{} {}", method, path)
    } else {
        format!("{} <unmatched>", method)
    }
}

pub struct RequestTelemetry;

impl<S, B> Transform<S, ServiceRequest> for RequestTelemetry
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTelemetryService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTelemetryService { service }))
    }
}

pub struct RequestTelemetryService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestTelemetryService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let endpoint = endpoint_label(&method, &path);
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        if let Some(app_state) = req.app_data::<web::Data<AppState>>() {
            app_state.increment_request_count();
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => {
                    let status = response.status();
                    let is_error = status.is_client_error() || status.is_server_error();

                    if let Some(app_state) = response.request().app_data::<web::Data<AppState>>() {
                        app_state.record_endpoint_request(&endpoint, duration_ms, is_error);
                        if is_error {
                            app_state.increment_error_count();
                        }
                    }

                    info!(
                        endpoint = %endpoint,
                        path = %path,
                        remote_addr = %remote_addr,
                        status = %status.as_u16(),
                        duration_ms = %duration_ms,
                        "Request completed"
                    );
                }
                Err(err) => {
                    warn!(
                        endpoint = %endpoint,
                        path = %path,
                        remote_addr = %remote_addr,
                        duration_ms = %duration_ms,
                        error = %err,
                        "Request failed"
                    );
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::AppError;
    use crate::transcription::{TranscriptionConfig, TranscriptionEngine};
    use actix_web::{App, HttpResponse};
    use candle_core::Device;
    use std::sync::Arc;

    #[test]
    fn test_endpoint_label_for_known_routes() {
        assert_eq!(endpoint_label("POST", "/chat"), "POST /chat");
        assert_eq!(endpoint_label("GET", "/health"), "GET /health");
        assert_eq!(
            endpoint_label("GET", "/api/v1/metrics"),
            "GET /api/v1/metrics"
        );
    }

    #[test]
    fn test_endpoint_label_collapses_unknown_paths() {
        assert_eq!(endpoint_label("GET", "/wp-admin.php"), "GET <unmatched>");
        assert_eq!(endpoint_label("POST", "/chat/extra"), "POST <unmatched>");
    }

    fn test_state() -> AppState {
        let engine = Arc::new(TranscriptionEngine::new(
            TranscriptionConfig::default(),
            Device::Cpu,
        ));
        AppState::new(AppConfig::default(), engine)
    }

    async fn ok_handler() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn failing_handler() -> Result<HttpResponse, AppError> {
        Err(AppError::Internal("boom".to_string()))
    }

    #[actix_web::test]
    async fn test_counts_successful_requests_per_endpoint() {
        let state = test_state();
        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(RequestTelemetry)
                .route("/chat", web::post().to(ok_handler)),
        )
        .await;

        let req = actix_web::test::TestRequest::post().uri("/chat").to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 1);
        assert_eq!(snapshot.error_count, 0);

        let metric = snapshot.endpoint_metrics.get("POST /chat").unwrap();
        assert_eq!(metric.request_count, 1);
        assert_eq!(metric.error_count, 0);
    }

    #[actix_web::test]
    async fn test_counts_error_responses() {
        let state = test_state();
        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(RequestTelemetry)
                .route("/upload", web::post().to(failing_handler)),
        )
        .await;

        let req = actix_web::test::TestRequest::post().uri("/upload").to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert!(resp.status().is_server_error());

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.error_count, 1);

        let metric = snapshot.endpoint_metrics.get("POST /upload").unwrap();
        assert_eq!(metric.error_count, 1);
    }

    #[actix_web::test]
    async fn test_unknown_paths_share_one_metrics_bucket() {
        let state = test_state();
        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(RequestTelemetry)
                .default_service(web::to(ok_handler)),
        )
        .await;

        for path in ["/a", "/b", "/c"] {
            let req = actix_web::test::TestRequest::get().uri(path).to_request();
            actix_web::test::call_service(&app, req).await;
        }

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.endpoint_metrics.len(), 1);
        let metric = snapshot.endpoint_metrics.get("GET <unmatched>").unwrap();
        assert_eq!(metric.request_count, 3);
    }
}
