//! Background job runner.
//!
//! Polls the store for queued generations and drives each one through the
//! provider workflow to a terminal state. Per-generation failures are stored
//! on the record and never escape the loop.

mod error;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{ProviderConfig, RunnerConfig};
use crate::db::{asset_repo, generation_repo, prompt_repo, Database};
use crate::model::{new_id, Generation, GenerationStatus, GenerationType, MediaAsset, Metadata};
use crate::provider::{JobState, Media, MediaProvider};
use crate::storage::{AssetMetadata, AssetStorage};

pub use error::{JobError, RunnerError};

/// Timing and model defaults the runner works with.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub poll_interval: Duration,
    pub video_poll_interval: Duration,
    pub video_max_poll_attempts: u32,
    pub default_image_model: String,
    pub default_video_model: String,
}

impl RunnerSettings {
    pub fn from_config(runner: &RunnerConfig, provider: &ProviderConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(runner.poll_interval_secs),
            video_poll_interval: Duration::from_secs(runner.video_poll_interval_secs),
            video_max_poll_attempts: runner.video_max_poll_attempts,
            default_image_model: provider.image_model.clone(),
            default_video_model: provider.video_model.clone(),
        }
    }

    fn default_model(&self, generation_type: GenerationType) -> &str {
        match generation_type {
            GenerationType::Image => &self.default_image_model,
            GenerationType::Video => &self.default_video_model,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerStatus {
    pub running: bool,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Summary of one `process_queued` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub picked: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Failed,
    Skipped,
}

/// What a successful job hands back for persistence.
struct Completion {
    asset_urls: Vec<String>,
    metadata: Metadata,
}

/// Handle to the runner. Cloning shares the same loop and counters.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    db: Database,
    media: Arc<dyn MediaProvider>,
    storage: Arc<dyn AssetStorage>,
    settings: RunnerSettings,
    running: AtomicBool,
    /// Bumped on every start so a loop left over from an earlier start exits.
    epoch: AtomicU64,
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl JobRunner {
    pub fn new(
        db: Database,
        media: Arc<dyn MediaProvider>,
        storage: Arc<dyn AssetStorage>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                db,
                media,
                storage,
                settings,
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                processed: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Spawns the polling loop. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let epoch = self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_loop(epoch).await });
        true
    }

    /// Asks the loop to exit before its next cycle. In-flight jobs finish.
    pub fn stop(&self) {
        if self.inner.running.swap(false, Ordering::AcqRel) {
            info!("Job runner stopping");
        }
    }

    pub fn status(&self) -> RunnerStatus {
        RunnerStatus {
            running: self.inner.running.load(Ordering::Acquire),
            processed: self.inner.processed.load(Ordering::Relaxed),
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }

    /// Runs a single cycle over every queued generation.
    pub async fn process_queued(&self) -> Result<CycleReport, RunnerError> {
        self.inner.process_queued().await
    }
}

impl RunnerInner {
    fn is_current(&self, epoch: u64) -> bool {
        self.running.load(Ordering::Acquire) && self.epoch.load(Ordering::Acquire) == epoch
    }

    async fn run_loop(&self, epoch: u64) {
        info!(
            interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Job runner started"
        );
        while self.is_current(epoch) {
            let delay = match self.process_queued().await {
                Ok(_) => self.settings.poll_interval,
                Err(e) => {
                    error!(error = %e, "Runner cycle failed");
                    self.settings.poll_interval * 2
                }
            };
            tokio::time::sleep(delay).await;
        }
        info!("Job runner stopped");
    }

    async fn process_queued(&self) -> Result<CycleReport, RunnerError> {
        self.cycle().instrument(info_span!("runner.cycle")).await
    }

    async fn cycle(&self) -> Result<CycleReport, RunnerError> {
        let queued = generation_repo::find_by_status(&self.db, GenerationStatus::Queued, None)?;
        let mut report = CycleReport {
            picked: queued.len(),
            ..CycleReport::default()
        };
        if queued.is_empty() {
            return Ok(report);
        }

        let outcomes = join_all(queued.iter().map(|g| self.process_one(g))).await;
        for outcome in outcomes {
            match outcome {
                Outcome::Succeeded => report.succeeded += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            picked = report.picked,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Runner cycle finished"
        );
        Ok(report)
    }

    async fn process_one(&self, generation: &Generation) -> Outcome {
        let span = info_span!(
            "runner.generation",
            generation_id = %generation.id,
            kind = %generation.generation_type,
        );
        async {
            match generation_repo::transition_status(
                &self.db,
                &generation.id,
                GenerationStatus::Queued,
                GenerationStatus::Running,
                Utc::now(),
            ) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Generation claimed elsewhere, skipping");
                    return Outcome::Skipped;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to claim generation");
                    return Outcome::Skipped;
                }
            }
            self.processed.fetch_add(1, Ordering::Relaxed);

            let result = match self.execute(generation).await {
                Ok(completion) => generation_repo::mark_complete(
                    &self.db,
                    &generation.id,
                    &completion.asset_urls,
                    &completion.metadata,
                    Utc::now(),
                )
                .map_err(JobError::from),
                Err(e) => Err(e),
            };

            match result {
                Ok(true) => {
                    self.succeeded.fetch_add(1, Ordering::Relaxed);
                    info!("Generation complete");
                    Outcome::Succeeded
                }
                Ok(false) => {
                    warn!("Generation left running state before completion was recorded");
                    Outcome::Skipped
                }
                Err(e) => {
                    self.record_failure(&generation.id, &e);
                    Outcome::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    fn record_failure(&self, generation_id: &str, err: &JobError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        let message = err.to_string();
        warn!(error = %message, "Generation failed");
        match generation_repo::mark_failed(&self.db, generation_id, &message, Utc::now()) {
            Ok(true) => {}
            Ok(false) => warn!("Generation was no longer running when recording failure"),
            Err(e) => error!(error = %e, "Failed to record generation failure"),
        }
    }

    async fn execute(&self, generation: &Generation) -> Result<Completion, JobError> {
        if generation.prompt_id.trim().is_empty() {
            return Err(JobError::MissingPrompt);
        }
        let prompt = prompt_repo::find_by_id(&self.db, &generation.prompt_id)?
            .ok_or_else(|| JobError::PromptNotFound(generation.prompt_id.clone()))?;
        let text = generation
            .enhanced_prompt()
            .map(str::to_string)
            .unwrap_or(prompt.text);

        let model = if generation.model.trim().is_empty() {
            self.settings
                .default_model(generation.generation_type)
                .to_string()
        } else {
            generation.model.clone()
        };

        let (media, job_id) = match generation.generation_type {
            GenerationType::Image => {
                let result = self.media.generate_image(&text, &model).await?;
                if !result.success {
                    return Err(JobError::Rejected(
                        result
                            .error
                            .unwrap_or_else(|| "Image generation failed".to_string()),
                    ));
                }
                (result.media, None)
            }
            GenerationType::Video => {
                let job = self.media.generate_video(&text, &model).await?;
                if !job.success {
                    return Err(JobError::Rejected(
                        job.error
                            .unwrap_or_else(|| "Video generation failed".to_string()),
                    ));
                }
                let job_id = job
                    .job_id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| JobError::Rejected("Provider returned no job id".to_string()))?;
                let media = self.await_video(&job_id).await?;
                (media, Some(job_id))
            }
        };

        if media.is_empty() {
            return Err(JobError::NoAssets);
        }
        let asset_urls = self.persist_assets(&generation.id, media)?;

        let mut metadata = generation.metadata.clone().unwrap_or_default();
        metadata.insert("provider".to_string(), json!(self.media.name()));
        metadata.insert("model".to_string(), json!(model));
        if let Some(job_id) = job_id {
            metadata.insert("jobId".to_string(), json!(job_id));
        }
        metadata.insert("assetCount".to_string(), json!(asset_urls.len()));
        metadata.insert(
            "completedAt".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        Ok(Completion {
            asset_urls,
            metadata,
        })
    }

    async fn await_video(&self, job_id: &str) -> Result<Vec<Media>, JobError> {
        let attempts = self.settings.video_max_poll_attempts;
        for attempt in 1..=attempts {
            tokio::time::sleep(self.settings.video_poll_interval).await;
            let status = self.media.poll_job_status(job_id).await?;
            match status.status {
                JobState::Complete => {
                    debug!(attempt, "Video job complete");
                    return Ok(status.media);
                }
                JobState::Failed => {
                    return Err(JobError::Rejected(
                        status
                            .error
                            .unwrap_or_else(|| "Video generation failed".to_string()),
                    ));
                }
                JobState::Pending | JobState::Running => {
                    debug!(attempt, state = ?status.status, "Video job in progress");
                }
            }
        }
        Err(JobError::Timeout { attempts })
    }

    /// Stores inline bytes and records one asset row per media item.
    fn persist_assets(
        &self,
        generation_id: &str,
        media: Vec<Media>,
    ) -> Result<Vec<String>, JobError> {
        let mut urls = Vec::with_capacity(media.len());
        for item in media {
            let content_type = item.content_type();
            let asset = match item {
                Media::Url(url) => MediaAsset {
                    id: new_id(),
                    generation_id: generation_id.to_string(),
                    url,
                    storage_key: None,
                    content_type,
                    size_bytes: None,
                    created_at: Utc::now(),
                },
                Media::Inline { data, .. } => {
                    let stored = self.storage.save(
                        &data,
                        &AssetMetadata {
                            generation_id: generation_id.to_string(),
                            content_type: content_type.clone(),
                        },
                    )?;
                    MediaAsset {
                        id: new_id(),
                        generation_id: generation_id.to_string(),
                        url: stored.url,
                        storage_key: Some(stored.key),
                        content_type,
                        size_bytes: Some(stored.size_bytes),
                        created_at: Utc::now(),
                    }
                }
            };
            asset_repo::insert(&self.db, &asset)?;
            urls.push(asset.url);
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IdeaPrompt;
    use crate::provider::{
        ImageResult, JobStatusResult, ProviderError, StubProvider, VideoJobResult,
    };
    use crate::storage::{FileSystemAssetStorage, UrlSigner};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn settings() -> RunnerSettings {
        RunnerSettings {
            poll_interval: Duration::from_millis(10),
            video_poll_interval: Duration::from_millis(1),
            video_max_poll_attempts: 5,
            default_image_model: "imagen-test".to_string(),
            default_video_model: "veo-test".to_string(),
        }
    }

    struct Harness {
        _dir: TempDir,
        db: Database,
        runner: JobRunner,
    }

    fn harness(media: Arc<dyn MediaProvider>) -> Harness {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let storage = Arc::new(FileSystemAssetStorage::new(
            dir.path(),
            "http://localhost:8080",
            UrlSigner::ephemeral(600),
        ));
        let runner = JobRunner::new(db.clone(), media, storage, settings());
        Harness {
            _dir: dir,
            db,
            runner,
        }
    }

    fn queue(db: &Database, generation_type: GenerationType, model: &str) -> Generation {
        let prompt = IdeaPrompt::new("author-1", "what if clouds were made of wool", vec![]);
        prompt_repo::insert(db, &prompt).unwrap();
        let generation = Generation::queued(&prompt.id, generation_type, model);
        generation_repo::insert(db, &generation).unwrap();
        generation
    }

    fn reload(db: &Database, id: &str) -> Generation {
        generation_repo::find_by_id(db, id).unwrap().unwrap()
    }

    /// Media provider with fixed answers.
    struct Scripted {
        image: ImageResult,
        polls: Vec<JobStatusResult>,
    }

    #[async_trait]
    impl MediaProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate_image(&self, _: &str, _: &str) -> Result<ImageResult, ProviderError> {
            Ok(self.image.clone())
        }

        async fn generate_video(&self, _: &str, _: &str) -> Result<VideoJobResult, ProviderError> {
            Ok(VideoJobResult::started("job-1"))
        }

        async fn poll_job_status(&self, _: &str) -> Result<JobStatusResult, ProviderError> {
            Ok(self
                .polls
                .first()
                .cloned()
                .unwrap_or_else(|| JobStatusResult::in_progress(JobState::Running)))
        }
    }

    #[tokio::test]
    async fn test_image_generation_completes() {
        let h = harness(Arc::new(StubProvider::new()));
        let generation = queue(&h.db, GenerationType::Image, "");

        let report = h.runner.process_queued().await.unwrap();
        assert_eq!(report.picked, 1);
        assert_eq!(report.succeeded, 1);

        let done = reload(&h.db, &generation.id);
        assert_eq!(done.status, GenerationStatus::Complete);
        let urls = done.asset_urls.clone().unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("http://localhost:8080/assets/"));

        let metadata = done.metadata.unwrap();
        assert_eq!(metadata["provider"], "stub");
        assert_eq!(metadata["model"], "imagen-test");
        assert_eq!(metadata["assetCount"], 1);
        assert!(metadata.contains_key("completedAt"));

        let assets = asset_repo::list_for_generation(&h.db, &generation.id).unwrap();
        assert_eq!(assets.len(), 1);
        assert!(assets[0].storage_key.is_some());
        assert_eq!(assets[0].url, urls[0]);

        let status = h.runner.status();
        assert_eq!((status.processed, status.succeeded, status.failed), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_video_generation_polls_until_complete() {
        let h = harness(Arc::new(StubProvider::with_video_polls(3)));
        let generation = queue(&h.db, GenerationType::Video, "veo-custom");

        h.runner.process_queued().await.unwrap();

        let done = reload(&h.db, &generation.id);
        assert_eq!(done.status, GenerationStatus::Complete);
        let metadata = done.metadata.unwrap();
        assert_eq!(metadata["model"], "veo-custom");
        assert!(metadata["jobId"].as_str().unwrap().starts_with("stub-op-"));
    }

    #[tokio::test]
    async fn test_provider_rejection_marks_failed() {
        let h = harness(Arc::new(Scripted {
            image: ImageResult::failed("quota exceeded"),
            polls: vec![],
        }));
        let generation = queue(&h.db, GenerationType::Image, "m");

        let report = h.runner.process_queued().await.unwrap();
        assert_eq!(report.failed, 1);

        let failed = reload(&h.db, &generation.id);
        assert_eq!(failed.status, GenerationStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("quota exceeded"));
        assert!(failed.asset_urls.is_none());
    }

    #[tokio::test]
    async fn test_empty_media_is_failure() {
        let h = harness(Arc::new(Scripted {
            image: ImageResult::ok(vec![]),
            polls: vec![],
        }));
        let generation = queue(&h.db, GenerationType::Image, "m");
        h.runner.process_queued().await.unwrap();

        let failed = reload(&h.db, &generation.id);
        assert_eq!(failed.status, GenerationStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Provider returned no assets"));
    }

    #[tokio::test]
    async fn test_remote_urls_recorded_without_storage() {
        let h = harness(Arc::new(Scripted {
            image: ImageResult::ok(vec![Media::Url("https://cdn.example/a.png".to_string())]),
            polls: vec![],
        }));
        let generation = queue(&h.db, GenerationType::Image, "m");
        h.runner.process_queued().await.unwrap();

        let done = reload(&h.db, &generation.id);
        assert_eq!(
            done.asset_urls.unwrap(),
            vec!["https://cdn.example/a.png".to_string()]
        );
        let assets = asset_repo::list_for_generation(&h.db, &generation.id).unwrap();
        assert_eq!(assets[0].storage_key, None);
        assert_eq!(assets[0].content_type, "image/png");
    }

    #[tokio::test]
    async fn test_video_timeout() {
        let h = harness(Arc::new(Scripted {
            image: ImageResult::failed("unused"),
            polls: vec![],
        }));
        let generation = queue(&h.db, GenerationType::Video, "m");
        h.runner.process_queued().await.unwrap();

        let failed = reload(&h.db, &generation.id);
        assert_eq!(failed.status, GenerationStatus::Failed);
        assert!(failed.error.unwrap().contains("timed out after 5"));
    }

    #[tokio::test]
    async fn test_video_job_failure() {
        let h = harness(Arc::new(Scripted {
            image: ImageResult::failed("unused"),
            polls: vec![JobStatusResult::failed("safety filter")],
        }));
        let generation = queue(&h.db, GenerationType::Video, "m");
        h.runner.process_queued().await.unwrap();

        assert_eq!(
            reload(&h.db, &generation.id).error.as_deref(),
            Some("safety filter")
        );
    }

    #[tokio::test]
    async fn test_unknown_prompt_fails() {
        let h = harness(Arc::new(StubProvider::new()));
        let generation = Generation::queued("missing-prompt", GenerationType::Image, "m");
        generation_repo::insert(&h.db, &generation).unwrap();

        h.runner.process_queued().await.unwrap();
        let failed = reload(&h.db, &generation.id);
        assert_eq!(failed.status, GenerationStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Prompt missing-prompt not found"));
    }

    #[tokio::test]
    async fn test_blank_prompt_id_fails() {
        let h = harness(Arc::new(StubProvider::new()));
        let generation = Generation::queued("", GenerationType::Image, "m");
        generation_repo::insert(&h.db, &generation).unwrap();

        h.runner.process_queued().await.unwrap();
        assert_eq!(
            reload(&h.db, &generation.id).error.as_deref(),
            Some("Generation has no promptId")
        );
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_siblings() {
        let h = harness(Arc::new(StubProvider::new()));
        let good = queue(&h.db, GenerationType::Image, "m");
        let bad = Generation::queued("missing-prompt", GenerationType::Image, "m");
        generation_repo::insert(&h.db, &bad).unwrap();

        let report = h.runner.process_queued().await.unwrap();
        assert_eq!(report.picked, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(reload(&h.db, &good.id).status, GenerationStatus::Complete);
    }

    #[tokio::test]
    async fn test_terminal_generations_not_reprocessed() {
        let h = harness(Arc::new(StubProvider::new()));
        let generation = queue(&h.db, GenerationType::Image, "m");
        h.runner.process_queued().await.unwrap();
        let first = reload(&h.db, &generation.id);

        let report = h.runner.process_queued().await.unwrap();
        assert_eq!(report.picked, 0);
        assert_eq!(reload(&h.db, &generation.id), first);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let h = harness(Arc::new(StubProvider::new()));
        let generation = queue(&h.db, GenerationType::Image, "m");

        assert!(h.runner.start());
        assert!(!h.runner.start());
        assert!(h.runner.status().running);

        for _ in 0..200 {
            if reload(&h.db, &generation.id).status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        h.runner.stop();
        assert!(!h.runner.status().running);
        assert_eq!(reload(&h.db, &generation.id).status, GenerationStatus::Complete);
    }
}
