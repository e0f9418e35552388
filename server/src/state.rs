//! Process wiring: builds every collaborator from the loaded configuration.

use std::sync::Arc;

use secrecy::SecretString;
use whatif::config::AppConfig;
use whatif::planner::PromptPlanner;
use whatif::policy::PolicyEnforcer;
use whatif::provider::{build_providers, Providers};
use whatif::runner::{JobRunner, RunnerSettings};
use whatif::service::{DefaultModels, GenerationService};
use whatif::storage::{AssetStorage, FileSystemAssetStorage, UrlSigner};
use whatif::{ConfigError, Database, WhatIfError};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    pub runner: JobRunner,
    pub storage: Arc<dyn AssetStorage>,
    /// Required in `x-admin-token` for job control when set.
    pub admin_token: Option<Arc<SecretString>>,
}

impl AppState {
    /// Opens the database and storage and selects the providers.
    pub fn build(config: &AppConfig) -> Result<Self, WhatIfError> {
        let db_path = config
            .database
            .resolved_path()
            .ok_or_else(|| missing("database path"))?;
        let db = Database::open(&db_path)?;

        let asset_dir = config
            .storage
            .resolved_directory()
            .ok_or_else(|| missing("storage directory"))?;
        let signer = match config.storage.signing_secret_source().resolve_optional()? {
            Some(secret) => UrlSigner::new(secret, config.storage.url_ttl_secs),
            None => {
                log::warn!(
                    "No storage signing secret configured; signed asset URLs will not survive a restart"
                );
                UrlSigner::ephemeral(config.storage.url_ttl_secs)
            }
        };
        log::info!("Storing assets in {}", asset_dir.display());
        let storage: Arc<dyn AssetStorage> = Arc::new(FileSystemAssetStorage::new(
            asset_dir,
            &config.server.public_base_url,
            signer,
        ));

        let providers = build_providers(&config.provider)?;

        let admin_token = config.server.admin_token_source().resolve_optional()?;
        if admin_token.is_none() {
            log::warn!("No admin token configured; job control endpoint is unauthenticated");
        }

        Ok(Self::from_parts(db, providers, storage, config, admin_token))
    }

    /// Assembles state from already-built collaborators.
    pub fn from_parts(
        db: Database,
        providers: Providers,
        storage: Arc<dyn AssetStorage>,
        config: &AppConfig,
        admin_token: Option<SecretString>,
    ) -> Self {
        let planner = PromptPlanner::new(providers.text, config.planner.clone());
        let policy = PolicyEnforcer::new(config.policy.clone());
        let service = GenerationService::new(
            db.clone(),
            planner,
            policy,
            storage.clone(),
            DefaultModels::from_config(&config.provider),
        );
        let runner = JobRunner::new(
            db,
            providers.media,
            storage.clone(),
            RunnerSettings::from_config(&config.runner, &config.provider),
        );

        Self {
            service: Arc::new(service),
            runner,
            storage,
            admin_token: admin_token.map(Arc::new),
        }
    }
}

fn missing(what: &str) -> WhatIfError {
    ConfigError::Validation {
        message: format!("Could not determine {}; set it explicitly", what),
    }
    .into()
}
