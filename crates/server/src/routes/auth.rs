use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use db::{
    models::user::{CreateUser, SignInRequest, SignUpRequest, User, UserError, UserProfile},
    repositories::{SessionRepository, UserRepository},
    services::AuthService,
};
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{clear_session_cookie, session_cookie, session_token_from_headers},
};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/logout", get(logout).post(logout))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Open a session for `user` and answer with the profile plus the cookie
async fn start_session(
    deployment: &DeploymentImpl,
    user: User,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let pool = &deployment.db().pool;
    let token = AuthService::generate_session_id();
    SessionRepository::create(
        pool,
        user.id,
        &AuthService::hash_session_token(&token),
        deployment.config().session_ttl(),
    )
    .await?;

    let profile = UserRepository::get_profile(pool, user.id).await?;
    let cookie = session_cookie(&token, deployment.config());

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        ResponseJson(ApiResponse::<UserProfile>::success(profile)),
    )
        .into_response())
}

/// POST /auth/signup
async fn signup(
    State(deployment): State<DeploymentImpl>,
    ResponseJson(req): ResponseJson<SignUpRequest>,
) -> Result<Response, ApiError> {
    let name = req.name.trim();
    let email = normalize_email(&req.email);
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Name, email and password are required".to_string(),
        ));
    }
    if !AuthService::is_acceptable_password(&req.password) {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let pool = &deployment.db().pool;
    if UserRepository::find_by_email(pool, &email).await?.is_some() {
        return Err(ApiError::BadRequest("Email already exists!".to_string()));
    }

    let password_hash = AuthService::hash_password(&req.password).map_err(UserError::Hash)?;
    let user = UserRepository::create(
        pool,
        CreateUser {
            name: name.to_string(),
            email,
            password_hash,
        },
    )
    .await?;

    tracing::info!("New user signed up: {}", user.id);
    start_session(&deployment, user, StatusCode::CREATED).await
}

/// POST /auth/signin
async fn signin(
    State(deployment): State<DeploymentImpl>,
    ResponseJson(req): ResponseJson<SignInRequest>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = UserRepository::find_by_email(&deployment.db().pool, &email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Email does not exist!".to_string()))?;

    let is_valid =
        AuthService::verify_password(&req.password, &user.password_hash).map_err(UserError::Hash)?;
    if !is_valid {
        return Err(ApiError::BadRequest("Incorrect password".to_string()));
    }

    start_session(&deployment, user, StatusCode::OK).await
}

/// GET|POST /auth/logout
/// Always succeeds; a missing or stale cookie just gets cleared.
async fn logout(
    State(deployment): State<DeploymentImpl>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = session_token_from_headers(&headers) {
        SessionRepository::delete_by_token_hash(
            &deployment.db().pool,
            &AuthService::hash_session_token(&token),
        )
        .await?;
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(deployment.config()))],
        ResponseJson(ApiResponse::<()>::success(())),
    )
        .into_response())
}
