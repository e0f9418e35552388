//! AI provider adapters.
//!
//! The planner talks to a [`TextModel`]; the job runner talks to a
//! [`MediaProvider`]. Both are object-safe async traits so the HTTP adapter
//! and the offline stub are interchangeable at runtime.

mod error;
pub mod gemini;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderConfig, ProviderKind};

pub use error::ProviderError;
pub use gemini::GeminiClient;
pub use stub::{StubProvider, StubTextModel};

/// What a text completion is for. Adapters may use it for logging; the stub
/// uses it to pick a canned answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTask {
    Enhance,
    Evaluate,
    Suggest,
    ApplySuggestions,
}

impl TextTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextTask::Enhance => "enhance",
            TextTask::Evaluate => "evaluate",
            TextTask::Suggest => "suggest",
            TextTask::ApplySuggestions => "apply_suggestions",
        }
    }
}

/// A single-turn text completion request.
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub task: TextTask,
    pub system: String,
    /// Full instruction sent to the model.
    pub prompt: String,
    /// The candidate prompt the instruction is about.
    pub subject: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

#[async_trait]
pub trait TextModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &TextRequest) -> Result<String, ProviderError>;
}

/// One produced media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    /// Already hosted by the provider.
    Url(String),
    /// Raw bytes that still need to be stored.
    Inline { data: Vec<u8>, content_type: String },
}

impl Media {
    pub fn content_type(&self) -> String {
        match self {
            Media::Inline { content_type, .. } => content_type.clone(),
            Media::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    pub success: bool,
    pub media: Vec<Media>,
    pub error: Option<String>,
}

impl ImageResult {
    pub fn ok(media: Vec<Media>) -> Self {
        Self {
            success: true,
            media,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            media: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJobResult {
    pub success: bool,
    pub job_id: Option<String>,
    pub error: Option<String>,
}

impl VideoJobResult {
    pub fn started(job_id: impl Into<String>) -> Self {
        Self {
            success: true,
            job_id: Some(job_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            job_id: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusResult {
    pub status: JobState,
    pub media: Vec<Media>,
    pub error: Option<String>,
}

impl JobStatusResult {
    pub fn in_progress(status: JobState) -> Self {
        Self {
            status,
            media: Vec::new(),
            error: None,
        }
    }

    pub fn complete(media: Vec<Media>) -> Self {
        Self {
            status: JobState::Complete,
            media,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobState::Failed,
            media: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait MediaProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_image(&self, prompt: &str, model: &str) -> Result<ImageResult, ProviderError>;

    /// Starts a long-running video job.
    async fn generate_video(&self, prompt: &str, model: &str)
        -> Result<VideoJobResult, ProviderError>;

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusResult, ProviderError>;
}

/// The pair of adapters a running service needs.
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextModel>,
    pub media: Arc<dyn MediaProvider>,
}

/// Builds the adapters selected by `config.kind`.
pub fn build_providers(config: &ProviderConfig) -> Result<Providers, ProviderError> {
    match config.kind {
        ProviderKind::Stub => {
            log::info!("Using offline stub provider");
            Ok(Providers {
                text: Arc::new(StubTextModel::new()),
                media: Arc::new(StubProvider::new()),
            })
        }
        ProviderKind::Gemini => {
            let api_key: SecretString = config
                .api_key_source()
                .resolve()
                .map_err(|e| ProviderError::Config(format!("API key: {}", e)))?;
            let client = Arc::new(GeminiClient::new(config, api_key)?);
            log::info!("Using Gemini provider at {}", config.base_url);
            Ok(Providers {
                text: client.clone(),
                media: client,
            })
        }
    }
}
