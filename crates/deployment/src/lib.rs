use std::time::Duration;

use anyhow::Error as AnyhowError;
use assistant::QueryResponder;
use async_trait::async_trait;
use db::{DBService, repositories::SessionRepository};
use services::services::{
    config::{Config, ConfigError},
    image::{ImageError, ImageService},
};
use sqlx::Error as SqlxError;
use thiserror::Error;

pub const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

/// Everything a request handler needs, behind one cloneable handle
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn responder(&self) -> &QueryResponder;

    fn image(&self) -> &ImageService;

    async fn cleanup_expired_sessions(&self) -> Result<u64, DeploymentError> {
        let removed = SessionRepository::cleanup_expired(&self.db().pool).await?;
        if removed > 0 {
            tracing::info!("Removed {} expired sessions", removed);
        }
        Ok(removed)
    }

    /// Sweep expired sessions now and then every hour
    fn spawn_session_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let deployment = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = deployment.cleanup_expired_sessions().await {
                    tracing::error!("Failed to clean up expired sessions: {}", e);
                }
            }
        })
    }

    fn log_configuration_gaps(&self) {
        if !self.responder().llm().is_configured() {
            tracing::warn!(
                "GEMINI_API_KEY or GEMINI_MODEL is not set - general questions will get a configuration error reply"
            );
        }
        if self.config().cookie_secure {
            tracing::info!("Session cookies are marked Secure; SameSite=None");
        }
    }
}
