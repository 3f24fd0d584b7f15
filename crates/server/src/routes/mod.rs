use axum::{
    Router,
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, header},
    middleware,
    routing::{IntoMakeService, get},
};
use deployment::Deployment;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{DeploymentImpl, middleware as app_middleware};

pub mod auth;
pub mod health;
pub mod images;
pub mod users;

/// Credentialed CORS for the configured browser origin
fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(_) => {
            tracing::warn!("Ignoring invalid CORS_ORIGIN {:?}", origin);
            return None;
        }
    };
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static(app_middleware::REQUEST_ID_HEADER),
            ]),
    )
}

/// Request span; `request_id` is filled in by the request-id middleware
fn http_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = tracing::field::Empty,
    )
}

pub fn app(deployment: DeploymentImpl) -> Router {
    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::router())
        .merge(users::router(&deployment))
        .merge(images::router())
        .with_state(deployment.clone());

    let app = Router::new()
        .nest("/api", base_routes)
        .layer(middleware::from_fn(app_middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(http_span));

    match cors_layer(&deployment.config().cors_origin) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    app(deployment).into_make_service()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;
    use tracing::{
        Subscriber,
        field::{Field, Visit},
        span,
    };
    use tracing_subscriber::{
        layer::{Context, Layer},
        prelude::*,
    };

    use crate::{middleware::REQUEST_ID_HEADER, test_support::TestApp};

    #[tokio::test]
    async fn test_health_carries_request_id() {
        let app = TestApp::new().await;
        let response = app.get("/api/health", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["data"], "OK");
        assert!(response.request_id.is_some());
    }

    /// Collects every value recorded into a `request_id` span field
    #[derive(Clone, Default)]
    struct RecordedRequestIds(Arc<Mutex<Vec<String>>>);

    impl Visit for RecordedRequestIds {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "request_id" {
                self.0.lock().unwrap().push(value.to_string());
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: Subscriber> Layer<S> for RecordedRequestIds {
        fn on_record(&self, _id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
            values.record(&mut self.clone());
        }
    }

    #[tokio::test]
    async fn test_request_id_is_recorded_on_the_http_span() {
        let recorded = RecordedRequestIds::default();
        let _guard = tracing_subscriber::registry()
            .with(recorded.clone())
            .set_default();

        let app = TestApp::new().await;
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header(REQUEST_ID_HEADER, "trace-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*recorded.0.lock().unwrap(), vec!["trace-7".to_string()]);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_with_credentials() {
        let app = TestApp::new().await;
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/user/current")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .header(REQUEST_ID_HEADER, "preflight-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[tokio::test]
    async fn test_unknown_routes_are_not_found() {
        let app = TestApp::new().await;
        assert_eq!(app.get("/api/nope", None).await.status, StatusCode::NOT_FOUND);
    }
}
