//! Domain records shared by the planner, policy, runner and repositories.

pub mod generation;
pub mod policy;
pub mod post;
pub mod prompt;

pub use generation::{
    AlignmentFeedback, Generation, GenerationStatus, GenerationType, Metadata, ENHANCED_PROMPT_KEY,
};
pub use policy::{PolicyFlag, Resolution, Severity, TargetType};
pub use post::{CommunityPost, MediaAsset};
pub use prompt::{IdeaPrompt, Language};

/// Returns a fresh record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
