use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

/// Top-level service configuration, usually loaded from `whatif.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL used when building asset links, without a trailing slash.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Token required by `POST /api/jobs`. Unset means the endpoint is open.
    #[serde(default)]
    pub admin_token: Option<String>,
    #[serde(default)]
    pub admin_token_file: Option<String>,
    #[serde(default)]
    pub admin_token_env_var: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: default_public_base_url(),
            admin_token: None,
            admin_token_file: None,
            admin_token_env_var: None,
        }
    }
}

impl ServerConfig {
    pub fn admin_token_source(&self) -> SecretSource<'_> {
        SecretSource::new(
            self.admin_token.as_deref(),
            self.admin_token_file.as_deref(),
            self.admin_token_env_var.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `~/.whatif/data/whatif.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match &self.path {
            Some(p) => Some(PathBuf::from(crate::secrets::expand_home(p))),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Asset root. Defaults to `~/.whatif/assets`.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default)]
    pub signing_secret_file: Option<String>,
    #[serde(default)]
    pub signing_secret_env_var: Option<String>,
    /// Lifetime window of signed asset URLs.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
}

fn default_url_ttl_secs() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            signing_secret: None,
            signing_secret_file: None,
            signing_secret_env_var: None,
            url_ttl_secs: default_url_ttl_secs(),
        }
    }
}

impl StorageConfig {
    pub fn signing_secret_source(&self) -> SecretSource<'_> {
        SecretSource::new(
            self.signing_secret.as_deref(),
            self.signing_secret_file.as_deref(),
            self.signing_secret_env_var.as_deref(),
        )
    }

    pub fn resolved_directory(&self) -> Option<PathBuf> {
        match &self.directory {
            Some(d) => Some(PathBuf::from(crate::secrets::expand_home(d))),
            None => dirs::home_dir().map(|h| h.join(".whatif").join("assets")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic offline provider.
    #[default]
    Stub,
    /// Google Generative Language API (Gemini, Imagen, Veo).
    Gemini,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stub" => Some(ProviderKind::Stub),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("GEMINI_API_KEY".to_string())
}

fn default_text_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_image_model() -> String {
    "imagen-3.0-generate-002".to_string()
}

fn default_video_model() -> String {
    "veo-2.0-generate-001".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: default_provider_base_url(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            video_model: default_video_model(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn api_key_source(&self) -> SecretSource<'_> {
        SecretSource::new(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Tuning for the prompt enhancement loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_confidence_threshold() -> f64 {
    0.7
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// How policy violations resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default = "default_true")]
    pub block_high_severity: bool,
    #[serde(default = "default_true")]
    pub require_review_medium: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            block_high_severity: true,
            require_review_medium: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Start the runner when the server boots.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub video_poll_interval_secs: u64,
    #[serde(default = "default_video_max_poll_attempts")]
    pub video_max_poll_attempts: u32,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_video_max_poll_attempts() -> u32 {
    120
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            poll_interval_secs: default_poll_interval_secs(),
            video_poll_interval_secs: default_poll_interval_secs(),
            video_max_poll_attempts: default_video_max_poll_attempts(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}
