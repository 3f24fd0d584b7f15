//! In-process router harness for handler tests

use assistant::{LLMClient, LLMConfig, QueryResponder};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use db::DBService;
use local_deployment::LocalDeployment;
use services::services::{config::Config, image::ImageService};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{middleware::REQUEST_ID_HEADER, routes};

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";

const BOUNDARY: &str = "assistant-test-boundary";

pub struct TestResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
    pub set_cookie: Option<String>,
    pub request_id: Option<String>,
}

/// `session_id=<token>` from a Set-Cookie value, or None when it clears the cookie
pub fn cookie_from(set_cookie: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let token = pair.strip_prefix("session_id=")?;
    (!token.is_empty()).then(|| pair.to_string())
}

pub struct TestApp {
    router: Router,
    _images: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_ask_limit(Config::default().ask_rate_limit_per_minute).await
    }

    pub async fn with_ask_limit(per_minute: u32) -> Self {
        let images = tempfile::tempdir().unwrap();
        let config = Config {
            ask_rate_limit_per_minute: per_minute,
            ..Config::default()
        };
        let db = DBService::new_in_memory().await.unwrap();
        let responder = QueryResponder::new(LLMClient::from_config(&LLMConfig::default()));
        let image =
            ImageService::local(images.path().to_path_buf(), config.max_image_bytes).unwrap();

        let deployment = LocalDeployment::from_parts(config, db, responder, image);
        Self {
            router: routes::app(deployment),
            _images: images,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.unwrap();
        let header_str = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let status = response.status();
        let set_cookie = header_str(header::SET_COOKIE.as_str());
        let request_id = header_str(REQUEST_ID_HEADER);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        TestResponse {
            status,
            body,
            set_cookie,
            request_id,
        }
    }

    fn builder(method: Method, path: &str, cookie: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(path);
        match cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let request = Self::builder(Method::GET, path, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn json(
        &self,
        method: Method,
        path: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> TestResponse {
        let request = Self::builder(method, path, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn multipart(
        &self,
        path: &str,
        cookie: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"assistantImage\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Self::builder(Method::POST, path, Some(cookie))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Status, content type and raw body
    pub async fn raw_get(&self, path: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, bytes.to_vec())
    }

    /// Register a user and return the `Cookie` header value for their session
    pub async fn sign_up(&self, email: &str) -> String {
        let response = self
            .json(
                Method::POST,
                "/api/auth/signup",
                None,
                serde_json::json!({"name": "Ada", "email": email, "password": "secret1"}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        cookie_from(response.set_cookie.as_deref().unwrap()).unwrap()
    }
}
