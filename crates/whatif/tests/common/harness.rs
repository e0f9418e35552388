//! Isolated service + runner environment.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tempfile::TempDir;

use whatif::config::{PlannerConfig, PolicyConfig};
use whatif::db::generation_repo;
use whatif::planner::PromptPlanner;
use whatif::provider::{
    ImageResult, JobStatusResult, MediaProvider, ProviderError, StubProvider, StubTextModel,
    VideoJobResult,
};
use whatif::runner::{JobRunner, RunnerSettings};
use whatif::service::{CreateGenerationRequest, CreatedGeneration, DefaultModels, GenerationService};
use whatif::storage::{AssetStorage, FileSystemAssetStorage, UrlSigner};
use whatif::{Database, Generation, GenerationType, PolicyEnforcer};

pub const BASE_URL: &str = "http://assets.test";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub storage: Arc<dyn AssetStorage>,
    pub service: GenerationService,
    pub runner: JobRunner,
}

impl TestHarness {
    /// Harness backed by the offline stub provider.
    pub fn new() -> Self {
        Self::with_media(Arc::new(StubProvider::with_video_polls(1)))
    }

    pub fn with_media(media: Arc<dyn MediaProvider>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("whatif.db")).expect("Failed to open database");
        let storage: Arc<dyn AssetStorage> = Arc::new(FileSystemAssetStorage::new(
            temp_dir.path().join("assets"),
            BASE_URL,
            UrlSigner::new(SecretString::from("integration-secret"), 600),
        ));

        let models = DefaultModels {
            image: "stub-image".to_string(),
            video: "stub-video".to_string(),
        };
        let service = GenerationService::new(
            db.clone(),
            PromptPlanner::new(Arc::new(StubTextModel::new()), PlannerConfig::default()),
            PolicyEnforcer::new(PolicyConfig::default()),
            storage.clone(),
            models.clone(),
        );
        let runner = JobRunner::new(
            db.clone(),
            media,
            storage.clone(),
            RunnerSettings {
                poll_interval: Duration::from_millis(10),
                video_poll_interval: Duration::from_millis(1),
                video_max_poll_attempts: 5,
                default_image_model: models.image,
                default_video_model: models.video,
            },
        );

        Self {
            temp_dir,
            db,
            storage,
            service,
            runner,
        }
    }

    pub fn asset_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("assets")
    }

    pub async fn create(&self, prompt: &str, generation_type: GenerationType) -> CreatedGeneration {
        self.service
            .create_generation(CreateGenerationRequest {
                author_id: "author-1".to_string(),
                prompt: prompt.to_string(),
                generation_type,
                model: None,
                tags: vec![],
            })
            .await
            .expect("create_generation failed")
    }

    /// Reads the stored row directly, bypassing URL signing.
    pub fn stored(&self, id: &str) -> Generation {
        generation_repo::find_by_id(&self.db, id)
            .expect("query failed")
            .expect("generation missing")
    }
}

/// Provider that answers every request with `success: false`.
pub struct RejectingProvider;

#[async_trait]
impl MediaProvider for RejectingProvider {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn generate_image(&self, _: &str, _: &str) -> Result<ImageResult, ProviderError> {
        Ok(ImageResult::failed("quota exceeded"))
    }

    async fn generate_video(&self, _: &str, _: &str) -> Result<VideoJobResult, ProviderError> {
        Ok(VideoJobResult::failed("quota exceeded"))
    }

    async fn poll_job_status(&self, _: &str) -> Result<JobStatusResult, ProviderError> {
        Ok(JobStatusResult::failed("quota exceeded"))
    }
}
