pub mod filesystem;
pub mod signing;

use crate::error::StorageError;

pub use filesystem::FileSystemAssetStorage;
pub use signing::UrlSigner;

/// Describes bytes handed to storage.
#[derive(Debug, Clone)]
pub struct AssetMetadata {
    pub generation_id: String,
    pub content_type: String,
}

/// Where a saved asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
}

/// Asset persistence: `save(bytes, metadata) -> url`, plus signed retrieval.
pub trait AssetStorage: Send + Sync {
    fn save(&self, bytes: &[u8], metadata: &AssetMetadata) -> Result<StoredAsset, StorageError>;

    /// Reads an asset back, returning its bytes and content type.
    fn read(&self, key: &str) -> Result<(Vec<u8>, String), StorageError>;

    /// Adds a signature to URLs this storage issued. Other URLs are returned
    /// unchanged.
    fn signed_url(&self, url: &str) -> String;

    fn verify(&self, key: &str, expires: i64, signature: &str) -> Result<(), StorageError>;
}

/// Rejects keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidKey(key.to_string());
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(invalid());
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid());
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid());
        }
    }
    Ok(())
}
