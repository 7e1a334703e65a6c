use std::sync::Arc;

use crate::config::AppConfig;
use crate::contract::{ContractPipeline, PdfConverter};
use crate::email::{BrevoEmailClient, EmailSender};
use crate::session::SessionKeys;
use crate::storage::{GoogleDriveStorage, ObjectStorage};

/// Shared by every worker through `web::Data`.
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Arc<ContractPipeline>,
    pub session: SessionKeys,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Arc<ContractPipeline>, session: SessionKeys) -> Self {
        Self {
            config,
            pipeline,
            session,
        }
    }

    /// Wire the production integrations. A broken Drive setup disables uploads
    /// instead of failing startup.
    pub async fn from_config(config: AppConfig) -> Self {
        let http_client = reqwest::Client::new();

        let storage: Option<Arc<dyn ObjectStorage>> = match &config.drive {
            Some(drive) => match GoogleDriveStorage::from_config(drive, http_client.clone()).await {
                Ok(storage) => {
                    log::info!("Drive uploads enabled ({})", drive.credentials_path.display());
                    Some(Arc::new(storage))
                }
                Err(e) => {
                    log::error!("Drive uploads disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        if config.brevo.api_key.is_none() {
            log::warn!("BREVO_API_KEY not set, emails will not be sent");
        }
        let mailer: Arc<dyn EmailSender> =
            Arc::new(BrevoEmailClient::new(config.brevo.clone(), http_client));

        let pipeline = ContractPipeline::new(
            config.template_path.clone(),
            config.output_dir.clone(),
            config.company.clone(),
            PdfConverter::new(config.soffice_timeout),
            storage,
            mailer,
        );
        let session = SessionKeys::from_secret_or_random(config.session_secret.as_deref());

        Self::new(config, Arc::new(pipeline), session)
    }
}
