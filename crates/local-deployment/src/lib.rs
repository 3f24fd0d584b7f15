use std::sync::Arc;

use assistant::{LLMClient, QueryResponder};
use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{config::Config, image::ImageService};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    responder: QueryResponder,
    image: ImageService,
}

impl LocalDeployment {
    /// Assemble a deployment from already-built parts
    pub fn from_parts(
        config: Config,
        db: DBService,
        responder: QueryResponder,
        image: ImageService,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db,
            responder,
            image,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;

        let db = match &config.database_url {
            Some(url) => DBService::connect(url).await?,
            None => DBService::new().await?,
        };

        let responder = QueryResponder::new(LLMClient::from_config(&config.llm));
        let image = ImageService::new(&config)?;

        let deployment = Self::from_parts(config, db, responder, image);
        deployment.log_configuration_gaps();
        Ok(deployment)
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn responder(&self) -> &QueryResponder {
        &self.responder
    }

    fn image(&self) -> &ImageService {
        &self.image
    }
}
