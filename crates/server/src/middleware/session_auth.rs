use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use db::{repositories::SessionRepository, services::AuthService};
use deployment::Deployment;
use services::services::config::Config;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

pub const SESSION_COOKIE: &str = "session_id";

/// The signed-in user, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token_hash: String,
}

pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .find_map(|part| part.trim().strip_prefix("session_id="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn cookie_attributes(config: &Config) -> &'static str {
    if config.cookie_secure {
        "Path=/; HttpOnly; Secure; SameSite=None"
    } else {
        "Path=/; HttpOnly; SameSite=Lax"
    }
}

pub fn session_cookie(token: &str, config: &Config) -> String {
    format!(
        "{SESSION_COOKIE}={}; {}; Max-Age={}",
        token,
        cookie_attributes(config),
        config.session_ttl().num_seconds()
    )
}

pub fn clear_session_cookie(config: &Config) -> String {
    format!("{SESSION_COOKIE}=; {}; Max-Age=0", cookie_attributes(config))
}

pub async fn require_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token_from_headers(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let token_hash = AuthService::hash_session_token(&token);
    let session = SessionRepository::find_active(&deployment.db().pool, &token_hash)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Session expired. Please sign in again.".to_string()))?;

    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(session.user_id.to_string()),
            ..Default::default()
        }));
    });

    req.extensions_mut().insert(AuthUser {
        user_id: session.user_id,
        token_hash,
    });
    Ok(next.run(req).await)
}
