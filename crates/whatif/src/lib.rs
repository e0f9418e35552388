pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod planner;
pub mod policy;
pub mod provider;
pub mod runner;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod storage;
pub mod text;

pub use config::{load_config, AppConfig};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, Result, StorageError, WhatIfError};
pub use model::{
    CommunityPost, Generation, GenerationStatus, GenerationType, IdeaPrompt, Language, MediaAsset,
    PolicyFlag, Resolution, Severity, TargetType,
};
pub use planner::{GenerationPlan, PromptPlanner, RefinementPlan};
pub use policy::{PolicyCheck, PolicyEnforcer};
pub use runner::{JobRunner, RunnerStatus};
pub use secrets::{SecretError, SecretSource};
pub use service::{GenerationService, ServiceError};
pub use text::{detect_language, generate_prompt_summary, validate_prompt_text};
