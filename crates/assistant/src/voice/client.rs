//! HTTP client a native front end uses to talk to the backend

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use utils::response::ApiResponse;

use crate::responder::AssistantReply;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not signed in")]
    MissingSession,

    #[error("Unexpected response: {0}")]
    Malformed(String),
}

/// Where the backend lives and who we are signed in as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub server_url: String,
    pub session_token: Option<String>,
}

impl ClientSession {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            session_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.server_url, path)
    }

    fn cookie(&self) -> Option<String> {
        self.session_token
            .as_ref()
            .map(|token| format!("{SESSION_COOKIE}={token}"))
    }
}

/// Profile fields a front end needs; extra fields are ignored
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    pub name: String,
    pub email: String,
    pub assistant_name: Option<String>,
    pub assistant_image: Option<String>,
    #[serde(default)]
    pub history: Vec<String>,
}

/// What the speech loop needs from the backend
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn ask(&self, command: &str) -> Result<AssistantReply, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
}

pub struct HttpAssistantClient {
    http: Client,
    session: RwLock<ClientSession>,
}

impl HttpAssistantClient {
    pub fn new(session: ClientSession) -> Self {
        Self {
            http: Client::new(),
            session: RwLock::new(session),
        }
    }

    pub async fn session(&self) -> ClientSession {
        self.session.read().await.clone()
    }

    /// Sign in and keep the session cookie for later calls
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteProfile, ClientError> {
        let url = self.session.read().await.url("/auth/signin");
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let token = session_token_from(&response);
        let profile: RemoteProfile = Self::unwrap_envelope(response).await?;

        let token = token.ok_or_else(|| {
            ClientError::Malformed("sign-in response did not set a session cookie".to_string())
        })?;
        self.session.write().await.session_token = Some(token);
        Ok(profile)
    }

    pub async fn current_user(&self) -> Result<RemoteProfile, ClientError> {
        let session = self.session().await;
        let cookie = session.cookie().ok_or(ClientError::MissingSession)?;

        let response = self
            .http
            .get(session.url("/user/current"))
            .header(header::COOKIE, cookie)
            .send()
            .await?;
        Self::unwrap_envelope(response).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body: ApiResponse<T, serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;

        if !status.is_success() || !body.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: body.message().unwrap_or("request failed").to_string(),
            });
        }

        body.into_data()
            .ok_or_else(|| ClientError::Malformed("response had no data".to_string()))
    }
}

fn session_token_from(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            cookie
                .split(';')
                .next()?
                .trim()
                .strip_prefix(&format!("{SESSION_COOKIE}="))
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
}

#[async_trait]
impl AssistantClient for HttpAssistantClient {
    async fn ask(&self, command: &str) -> Result<AssistantReply, ClientError> {
        let session = self.session().await;
        let cookie = session.cookie().ok_or(ClientError::MissingSession)?;

        let response = self
            .http
            .post(session.url("/user/asktoassistant"))
            .header(header::COOKIE, cookie)
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await?;
        Self::unwrap_envelope(response).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let session = self.session().await;
        let mut request = self.http.post(session.url("/auth/logout"));
        if let Some(cookie) = session.cookie() {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await?;
        self.session.write().await.session_token = None;

        if response.status() != StatusCode::OK {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                message: "logout failed".to_string(),
            });
        }
        Ok(())
    }
}
