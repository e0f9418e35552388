//! API-layer orchestration: plan, check and persist new generations, and the
//! refine / feedback / publish / feed flows around them.

mod error;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};

use crate::config::ProviderConfig;
use crate::db::{flag_repo, generation_repo, post_repo, prompt_repo, Database};
use crate::model::{
    new_id, AlignmentFeedback, CommunityPost, Generation, GenerationStatus, GenerationType,
    IdeaPrompt, Language, Metadata, TargetType, ENHANCED_PROMPT_KEY,
};
use crate::planner::PromptPlanner;
use crate::policy::PolicyEnforcer;
use crate::storage::AssetStorage;
use crate::text::generate_prompt_summary;

pub use error::ServiceError;

/// Longest accepted caption or feedback note, in characters.
pub const MAX_NOTE_CHARS: usize = 500;
/// Length of the prompt summary shown on community posts.
pub const POST_SUMMARY_CHARS: usize = 80;
pub const DEFAULT_FEED_LIMIT: u64 = 20;
pub const MAX_FEED_LIMIT: u64 = 100;
const MAX_TAGS: usize = 10;
const MAX_MODEL_ID_CHARS: usize = 128;

/// Model used when a request names none.
#[derive(Debug, Clone)]
pub struct DefaultModels {
    pub image: String,
    pub video: String,
}

impl DefaultModels {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            image: config.image_model.clone(),
            video: config.video_model.clone(),
        }
    }

    fn for_type(&self, generation_type: GenerationType) -> &str {
        match generation_type {
            GenerationType::Image => &self.image,
            GenerationType::Video => &self.video,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGenerationRequest {
    pub author_id: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub generation_type: GenerationType,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedGeneration {
    pub generation_id: String,
    pub prompt_id: String,
    pub status: GenerationStatus,
    pub enhanced_prompt: String,
    pub confidence: f64,
    pub suggestions: Vec<String>,
    pub language: Language,
    /// Some policy check asked for a human look; generation still proceeds.
    pub needs_review: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    pub guidance: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedGeneration {
    pub generation_id: String,
    pub refinement_of: String,
    pub status: GenerationStatus,
    pub refined_prompt: String,
    pub enhanced_prompt: String,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub generation_id: String,
    pub matches_intent: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub generation_id: String,
    pub author_id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<CommunityPost>,
    pub total: u64,
    pub next_offset: Option<u64>,
}

pub struct GenerationService {
    db: Database,
    planner: PromptPlanner,
    policy: PolicyEnforcer,
    storage: Arc<dyn AssetStorage>,
    models: DefaultModels,
}

impl GenerationService {
    pub fn new(
        db: Database,
        planner: PromptPlanner,
        policy: PolicyEnforcer,
        storage: Arc<dyn AssetStorage>,
        models: DefaultModels,
    ) -> Self {
        Self {
            db,
            planner,
            policy,
            storage,
            models,
        }
    }

    /// Plans the prompt, checks it against policy, and queues a generation.
    pub async fn create_generation(
        &self,
        request: CreateGenerationRequest,
    ) -> Result<CreatedGeneration, ServiceError> {
        let span = info_span!(
            "service.create_generation",
            author_id = %request.author_id,
            kind = %request.generation_type,
        );
        self.create_generation_inner(request).instrument(span).await
    }

    async fn create_generation_inner(
        &self,
        request: CreateGenerationRequest,
    ) -> Result<CreatedGeneration, ServiceError> {
        let author_id = require_field("authorId", &request.author_id)?;
        let tags = normalize_tags(request.tags)?;
        let requested_model = requested_model(request.model.as_deref())?;

        let plan = self
            .planner
            .plan_generation(&request.prompt, request.generation_type)
            .await?;

        let prompt = IdeaPrompt::new(author_id, &plan.original_prompt, tags);
        let check = self.policy.check_prompt(&plan.original_prompt, author_id);
        prompt_repo::insert(&self.db, &prompt)?;
        flag_repo::insert_all(&self.db, &check.flags_for(TargetType::Prompt, &prompt.id))?;

        if !check.allowed {
            info!(prompt_id = %prompt.id, "Prompt blocked by policy");
            return Err(ServiceError::PolicyViolation(check));
        }

        let mut metadata = Metadata::new();
        metadata.insert(ENHANCED_PROMPT_KEY.to_string(), json!(plan.enhanced_prompt));
        metadata.insert("confidence".to_string(), json!(plan.confidence));
        metadata.insert("planAttempts".to_string(), json!(plan.attempts));
        if plan.used_fallback {
            metadata.insert("planFallback".to_string(), json!(true));
        }

        let model = match requested_model {
            Some(m) => m.to_string(),
            None => self.models.for_type(request.generation_type).to_string(),
        };
        let generation =
            Generation::queued(&prompt.id, request.generation_type, &model).with_metadata(metadata);
        generation_repo::insert(&self.db, &generation)?;

        info!(
            generation_id = %generation.id,
            confidence = plan.confidence,
            "Generation queued"
        );

        Ok(CreatedGeneration {
            generation_id: generation.id,
            prompt_id: prompt.id,
            status: generation.status,
            enhanced_prompt: plan.enhanced_prompt,
            confidence: plan.confidence,
            suggestions: plan.suggestions,
            language: plan.language,
            needs_review: check.needs_review(),
        })
    }

    /// Returns the generation with its asset URLs signed for retrieval.
    ///
    /// Repeated reads return the same record. The signed URLs are identical
    /// only while the calls fall in one signing window (`storage.url_ttl_secs`);
    /// across a window boundary the same asset gets a later `expires` and a new
    /// signature.
    pub fn get_generation(&self, id: &str) -> Result<Generation, ServiceError> {
        let mut generation = self.find_generation(id)?;
        if let Some(urls) = generation.asset_urls.as_mut() {
            for url in urls.iter_mut() {
                *url = self.storage.signed_url(url);
            }
        }
        Ok(generation)
    }

    /// Queues a new generation derived from a completed one plus guidance.
    pub async fn refine_generation(
        &self,
        id: &str,
        request: RefineRequest,
    ) -> Result<RefinedGeneration, ServiceError> {
        let span = info_span!("service.refine_generation", generation_id = %id);
        self.refine_generation_inner(id, request).instrument(span).await
    }

    async fn refine_generation_inner(
        &self,
        id: &str,
        request: RefineRequest,
    ) -> Result<RefinedGeneration, ServiceError> {
        let requested_model = requested_model(request.model.as_deref())?;
        let original = self.find_generation(id)?;
        if original.status != GenerationStatus::Complete {
            return Err(ServiceError::InvalidState(format!(
                "Generation {} is {}; only complete generations can be refined",
                original.id, original.status
            )));
        }
        let prompt = self.prompt_of(&original)?;

        let refinement = self
            .planner
            .plan_refinement(&original, &prompt.text, &request.guidance)?;

        let check = self
            .policy
            .check_prompt(&refinement.refined_prompt, &prompt.author_id);
        if !check.allowed {
            flag_repo::insert_all(
                &self.db,
                &check.flags_for(TargetType::Generation, &original.id),
            )?;
            info!("Refinement blocked by policy");
            return Err(ServiceError::PolicyViolation(check));
        }

        let plan = self
            .planner
            .plan_generation(&refinement.refined_prompt, original.generation_type)
            .await?;

        let mut metadata = Metadata::new();
        metadata.insert(ENHANCED_PROMPT_KEY.to_string(), json!(plan.enhanced_prompt));
        metadata.insert("refinedPrompt".to_string(), json!(refinement.refined_prompt));
        metadata.insert("improvements".to_string(), json!(refinement.improvements));
        metadata.insert("confidence".to_string(), json!(plan.confidence));

        let model = requested_model.unwrap_or(original.model.as_str()).to_string();
        let generation = Generation::queued(&prompt.id, original.generation_type, &model)
            .with_refinement_of(&original.id)
            .with_metadata(metadata);
        generation_repo::insert(&self.db, &generation)?;
        flag_repo::insert_all(
            &self.db,
            &check.flags_for(TargetType::Generation, &generation.id),
        )?;

        info!(refinement_id = %generation.id, "Refinement queued");

        Ok(RefinedGeneration {
            generation_id: generation.id,
            refinement_of: original.id,
            status: generation.status,
            refined_prompt: refinement.refined_prompt,
            enhanced_prompt: plan.enhanced_prompt,
            improvements: refinement.improvements,
        })
    }

    /// Records whether a result matched what the user meant.
    pub fn submit_feedback(&self, request: FeedbackRequest) -> Result<(), ServiceError> {
        let note = optional_text("note", request.note)?;
        let feedback = AlignmentFeedback {
            matches_intent: request.matches_intent,
            note,
        };
        if !generation_repo::set_alignment_feedback(
            &self.db,
            &request.generation_id,
            &feedback,
            Utc::now(),
        )? {
            return Err(not_found(&request.generation_id));
        }
        info!(
            generation_id = %request.generation_id,
            matches_intent = feedback.matches_intent,
            "Feedback recorded"
        );
        Ok(())
    }

    /// Shares a completed generation to the community feed.
    pub fn publish(&self, request: PublishRequest) -> Result<CommunityPost, ServiceError> {
        let _span = info_span!("service.publish", generation_id = %request.generation_id).entered();

        let author_id = require_field("authorId", &request.author_id)?;
        let caption = optional_text("caption", request.caption)?;
        let generation = self.find_generation(&request.generation_id)?;
        if generation.status != GenerationStatus::Complete {
            return Err(ServiceError::InvalidState(format!(
                "Generation {} is {}; only complete generations can be published",
                generation.id, generation.status
            )));
        }
        let prompt = self.prompt_of(&generation)?;

        if let Some(caption) = caption.as_deref() {
            let check = self.policy.check_prompt(caption, author_id);
            flag_repo::insert_all(
                &self.db,
                &check.flags_for(TargetType::Generation, &generation.id),
            )?;
            if !check.allowed {
                return Err(ServiceError::PolicyViolation(check));
            }
        }

        let post = CommunityPost {
            id: new_id(),
            generation_id: generation.id.clone(),
            author_id: author_id.to_string(),
            caption,
            prompt_summary: generate_prompt_summary(&prompt.text, POST_SUMMARY_CHARS),
            cover_url: generation
                .asset_urls
                .as_ref()
                .and_then(|urls| urls.first().cloned()),
            created_at: Utc::now(),
        };

        match post_repo::insert(&self.db, &post) {
            Ok(()) => {}
            Err(e) if post_repo::is_duplicate(&e) => {
                return Err(ServiceError::Conflict(format!(
                    "Generation {} is already published",
                    generation.id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        info!(post_id = %post.id, "Generation published");
        Ok(self.sign_post(post))
    }

    /// One page of the community feed, newest first.
    pub fn feed(&self, limit: Option<u64>, offset: Option<u64>) -> Result<FeedPage, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
        let offset = offset.unwrap_or(0);
        let (posts, total) = post_repo::list(&self.db, limit, offset)?;

        let consumed = offset + posts.len() as u64;
        let next_offset = (consumed < total && !posts.is_empty()).then_some(consumed);
        Ok(FeedPage {
            items: posts.into_iter().map(|p| self.sign_post(p)).collect(),
            total,
            next_offset,
        })
    }

    fn find_generation(&self, id: &str) -> Result<Generation, ServiceError> {
        generation_repo::find_by_id(&self.db, id)?.ok_or_else(|| not_found(id))
    }

    fn prompt_of(&self, generation: &Generation) -> Result<IdeaPrompt, ServiceError> {
        prompt_repo::find_by_id(&self.db, &generation.prompt_id)?.ok_or_else(|| {
            warn!(
                generation_id = %generation.id,
                prompt_id = %generation.prompt_id,
                "Generation references a missing prompt"
            );
            ServiceError::DataIntegrity(format!(
                "Prompt {} for generation {} is missing",
                generation.prompt_id, generation.id
            ))
        })
    }

    fn sign_post(&self, mut post: CommunityPost) -> CommunityPost {
        post.cover_url = post.cover_url.map(|url| self.storage.signed_url(&url));
        post
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Generation {}", id))
}

fn require_field<'a>(name: &str, value: &'a str) -> Result<&'a str, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", name)));
    }
    Ok(trimmed)
}

/// A caller-chosen model id, trimmed; blank means the configured default.
/// Ids end up in provider URL paths, so only `[A-Za-z0-9._-]` is accepted,
/// starting with a letter or digit and without `..`.
fn requested_model(requested: Option<&str>) -> Result<Option<&str>, ServiceError> {
    let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(None);
    };
    let valid = model.len() <= MAX_MODEL_ID_CHARS
        && model.starts_with(|c: char| c.is_ascii_alphanumeric())
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && !model.contains("..");
    if !valid {
        return Err(ServiceError::validation(format!(
            "model '{}' is not a valid model id",
            crate::sanitize::truncate_for_log(model)
        )));
    }
    Ok(Some(model))
}

/// Trims optional free text; blank becomes `None`.
fn optional_text(name: &str, value: Option<String>) -> Result<Option<String>, ServiceError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTE_CHARS {
        return Err(ServiceError::validation(format!(
            "{} cannot exceed {} characters",
            name, MAX_NOTE_CHARS
        )));
    }
    Ok(Some(trimmed.to_string()))
}

fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, ServiceError> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    if normalized.len() > MAX_TAGS {
        return Err(ServiceError::validation(format!(
            "At most {} tags are allowed",
            MAX_TAGS
        )));
    }
    Ok(normalized)
}
