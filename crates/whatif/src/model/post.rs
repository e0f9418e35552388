use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored asset produced by a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: String,
    pub generation_id: String,
    pub url: String,
    /// Set when the bytes live in our own storage rather than at a remote URL.
    pub storage_key: Option<String>,
    pub content_type: String,
    pub size_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// A completed generation shared to the community feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPost {
    pub id: String,
    pub generation_id: String,
    pub author_id: String,
    pub caption: Option<String>,
    pub prompt_summary: String,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
