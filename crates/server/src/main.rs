use anyhow::Error as AnyhowError;
use deployment::{Deployment, DeploymentError};
use server::{DeploymentImpl, routes};
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::{
    assets::asset_dir,
    sentry::{init_once, sentry_layer},
};

#[derive(Debug, Error)]
pub enum AssistantServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), AssistantServerError> {
    // Load environment variables from `.env` so local runs pick up API keys
    dotenv::dotenv().ok();

    let _sentry = init_once();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},assistant={level},deployment={level},local_deployment={level},utils={level},tower_http={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("Failed to create tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(sentry_layer())
        .init();

    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())?;
    }

    let deployment = DeploymentImpl::new().await?;
    deployment.spawn_session_cleanup();

    let address = deployment
        .config()
        .bind_address()
        .map_err(DeploymentError::from)?;
    let app_router = routes::router(deployment);

    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app_router).await?;
    Ok(())
}
