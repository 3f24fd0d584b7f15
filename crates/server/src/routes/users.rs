use std::sync::Arc;

use assistant::{AssistantReply, Persona};
use axum::{
    Extension, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    models::user::{UpdateAssistant, UserError, UserProfile},
    repositories::UserRepository,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::image::UploadedImage;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{AskRateLimiter, AuthUser, rate_limit::RATE_LIMIT_MESSAGE, require_auth},
};

/// Room for the text fields and multipart framing around the image
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let limiter = Arc::new(AskRateLimiter::per_minute(
        deployment.config().ask_rate_limit_per_minute,
    ));
    let upload_limit = deployment.image().max_bytes() + MULTIPART_OVERHEAD;

    Router::new()
        .route("/user/current", get(current_user))
        .route(
            "/user/update",
            post(update_assistant).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/user/asktoassistant", post(ask_to_assistant))
        .layer(Extension(limiter))
        .layer(from_fn_with_state(deployment.clone(), require_auth))
}

/// GET /user/current
async fn current_user(
    State(deployment): State<DeploymentImpl>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let profile = UserRepository::get_profile(&deployment.db().pool, auth.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

#[derive(Debug, Default)]
struct AssistantForm {
    assistant_name: Option<String>,
    image_url: Option<String>,
    image: Option<UploadedImage>,
}

impl AssistantForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("assistantName") => form.assistant_name = Some(field.text().await?),
                Some("imageUrl") => form.image_url = Some(field.text().await?),
                Some("assistantImage") => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?.to_vec();
                    // Browsers send an empty part when no file was picked
                    if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
                        continue;
                    }
                    form.image = Some(UploadedImage {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

/// POST /user/update
/// An uploaded file wins over `imageUrl`; with neither the stored image is kept.
async fn update_assistant(
    State(deployment): State<DeploymentImpl>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let form = AssistantForm::read(multipart).await?;

    let assistant_name = form
        .assistant_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Assistant name is required".to_string()))?;

    let assistant_image = match form.image {
        Some(upload) => Some(deployment.image().store(upload).await?),
        None => form
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
    };

    let pool = &deployment.db().pool;
    UserRepository::update_assistant(
        pool,
        auth.user_id,
        UpdateAssistant {
            assistant_name,
            assistant_image,
        },
    )
    .await?;

    let profile = UserRepository::get_profile(pool, auth.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

#[derive(Debug, Default, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct AskRequest {
    pub command: String,
}

/// POST /user/asktoassistant
async fn ask_to_assistant(
    State(deployment): State<DeploymentImpl>,
    Extension(auth): Extension<AuthUser>,
    Extension(limiter): Extension<Arc<AskRateLimiter>>,
    ResponseJson(req): ResponseJson<AskRequest>,
) -> Result<ResponseJson<ApiResponse<AssistantReply>>, ApiError> {
    let command = req.command.trim();
    if command.is_empty() {
        return Err(ApiError::BadRequest("Command is required".to_string()));
    }

    limiter
        .check(auth.user_id)
        .map_err(|_| ApiError::TooManyRequests(RATE_LIMIT_MESSAGE.to_string()))?;

    let pool = &deployment.db().pool;
    let user = UserRepository::find_by_id(pool, auth.user_id)
        .await?
        .ok_or(UserError::NotFound)?;
    UserRepository::append_history(pool, user.id, command).await?;

    let persona = Persona::new(user.assistant_name.as_deref(), user.name);
    let reply = deployment.responder().respond(command, &persona).await;
    tracing::debug!("Answered {:?} for user {}", reply.kind, user.id);

    Ok(ResponseJson(ApiResponse::success(reply)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::test_support::{PNG_BYTES, TestApp};

    #[tokio::test]
    async fn test_user_routes_require_session() {
        let app = TestApp::new().await;
        let response = app.get("/api/user/current", None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body["success"], false);

        let forged = app.get("/api/user/current", Some("session_id=forged")).await;
        assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_ask_answers_math_and_records_history() {
        let app = TestApp::new().await;
        let cookie = app.sign_up("ada@example.com").await;

        let reply = app
            .json(
                Method::POST,
                "/api/user/asktoassistant",
                Some(cookie.as_str()),
                serde_json::json!({"command": "what is 5 plus 10"}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["type"], "calculation");
        assert_eq!(reply.body["data"]["response"], "The result is 15");

        let me = app.get("/api/user/current", Some(cookie.as_str())).await;
        assert_eq!(me.body["data"]["history"][0], "what is 5 plus 10");
    }

    #[tokio::test]
    async fn test_ask_without_llm_config_degrades_to_text() {
        let app = TestApp::new().await;
        let cookie = app.sign_up("ada@example.com").await;

        let reply = app
            .json(
                Method::POST,
                "/api/user/asktoassistant",
                Some(cookie.as_str()),
                serde_json::json!({"command": "who wrote hamlet"}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["type"], "general");
        assert_eq!(
            reply.body["data"]["response"],
            "Configuration error: missing API key or model."
        );
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_command() {
        let app = TestApp::new().await;
        let cookie = app.sign_up("ada@example.com").await;
        let reply = app
            .json(
                Method::POST,
                "/api/user/asktoassistant",
                Some(cookie.as_str()),
                serde_json::json!({"command": "   "}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ask_is_rate_limited_per_user() {
        let app = TestApp::with_ask_limit(2).await;
        let cookie = app.sign_up("ada@example.com").await;
        for _ in 0..2 {
            let ok = app
                .json(
                    Method::POST,
                    "/api/user/asktoassistant",
                    Some(cookie.as_str()),
                    serde_json::json!({"command": "2 plus 2"}),
                )
                .await;
            assert_eq!(ok.status, StatusCode::OK);
        }

        let limited = app
            .json(
                Method::POST,
                "/api/user/asktoassistant",
                Some(cookie.as_str()),
                serde_json::json!({"command": "2 plus 2"}),
            )
            .await;
        assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            limited.body["message"],
            "You're asking too quickly. Please wait a moment and try again."
        );
    }

    #[tokio::test]
    async fn test_update_with_image_url_then_name_only() {
        let app = TestApp::new().await;
        let cookie = app.sign_up("ada@example.com").await;

        let updated = app
            .multipart(
                "/api/user/update",
                &cookie,
                &[("assistantName", "Nova"), ("imageUrl", "https://img.example/nova.png")],
                None,
            )
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["data"]["assistantName"], "Nova");
        assert_eq!(
            updated.body["data"]["assistantImage"],
            "https://img.example/nova.png"
        );

        let renamed = app
            .multipart("/api/user/update", &cookie, &[("assistantName", "Jarvis")], None)
            .await;
        assert_eq!(renamed.body["data"]["assistantName"], "Jarvis");
        assert_eq!(
            renamed.body["data"]["assistantImage"],
            "https://img.example/nova.png"
        );
    }

    #[tokio::test]
    async fn test_uploaded_file_wins_and_is_served() {
        let app = TestApp::new().await;
        let cookie = app.sign_up("ada@example.com").await;

        let updated = app
            .multipart(
                "/api/user/update",
                &cookie,
                &[("assistantName", "Nova"), ("imageUrl", "https://img.example/ignored.png")],
                Some(("avatar.png", "image/png", PNG_BYTES)),
            )
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        let image = updated.body["data"]["assistantImage"].as_str().unwrap().to_string();
        assert!(image.starts_with("/api/images/"));
        assert!(image.ends_with(".png"));

        let served = app.raw_get(&image).await;
        assert_eq!(served.0, StatusCode::OK);
        assert_eq!(served.1.as_deref(), Some("image/png"));
        assert_eq!(served.2, PNG_BYTES);
    }

    #[tokio::test]
    async fn test_update_rejects_bad_uploads() {
        let app = TestApp::new().await;
        let cookie = app.sign_up("ada@example.com").await;

        let not_image = app
            .multipart(
                "/api/user/update",
                &cookie,
                &[("assistantName", "Nova")],
                Some(("notes.txt", "text/plain", &b"hello there"[..])),
            )
            .await;
        assert_eq!(not_image.status, StatusCode::BAD_REQUEST);

        let nameless = app
            .multipart("/api/user/update", &cookie, &[("imageUrl", "x")], None)
            .await;
        assert_eq!(nameless.status, StatusCode::BAD_REQUEST);
        assert_eq!(nameless.body["message"], "Assistant name is required");
    }
}
