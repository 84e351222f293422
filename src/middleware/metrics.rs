//! # Request Metrics
//!
//! Feeds the per-endpoint counters behind `GET /api/v1/metrics`. CORS
//! preflight requests are not counted; they say nothing about the API.

use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

/// Counts requests, errors and latency per route into `AppState` metrics.
///
/// Requests are keyed by the matched route pattern (`POST /api/predict`), not
/// the raw path. Arbitrary probe URLs would otherwise each add an entry to the
/// endpoint table, so every unmatched path shares one `<unmatched>` bucket.
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService { service }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
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
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let route = req.match_pattern().unwrap_or_else(|| "<unmatched>".to_string());
        let endpoint = format!("{} {}", req.method(), route);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        if let Some(state) = &state {
            state.increment_request_count();
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let is_error = match &result {
                Ok(response) => response.status().is_client_error() || response.status().is_server_error(),
                Err(_) => true,
            };

            if let Some(state) = state {
                state.record_endpoint_request(&endpoint, duration_ms, is_error);
                if is_error {
                    state.increment_error_count();
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::configure;
    use crate::test_support::{test_state, EchoGenerator};
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_unmatched_paths_share_one_bucket() {
        let state = test_state(Arc::new(EchoGenerator::new("x")));
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(MetricsMiddleware)
                .configure(configure),
        )
        .await;

        for uri in ["/wp-login.php", "/.env", "/cgi-bin/status"] {
            test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        }
        test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        test::call_service(
            &app,
            test::TestRequest::default()
                .method(Method::OPTIONS)
                .uri("/api/predict")
                .to_request(),
        )
        .await;

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.request_count, 4);
        assert_eq!(metrics.error_count, 3);
        assert_eq!(metrics.endpoint_metrics.len(), 2);
        assert_eq!(metrics.endpoint_metrics["GET <unmatched>"].request_count, 3);
        assert_eq!(metrics.endpoint_metrics["GET /health"].error_count, 0);
    }
}
