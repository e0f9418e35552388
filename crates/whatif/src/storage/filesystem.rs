use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};

use super::{validate_key, AssetMetadata, AssetStorage, StoredAsset, UrlSigner};
use crate::error::StorageError;

/// Route prefix under which the server serves stored assets.
pub const ASSET_ROUTE: &str = "/assets/";

/// Stores assets under `root/{yyyy}/{mm}/{generation_id}.{ext}`.
pub struct FileSystemAssetStorage {
    root: PathBuf,
    public_base_url: String,
    signer: UrlSigner,
}

impl FileSystemAssetStorage {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: &str, signer: UrlSigner) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            signer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_prefix(&self) -> String {
        format!("{}{}", self.public_base_url, ASSET_ROUTE)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Creates the file with `create_new` so concurrent saves for the same
    /// generation never overwrite each other; collisions get a numeric suffix.
    fn create_exclusive(
        &self,
        dir_path: &Path,
        base: &str,
        extension: &str,
        content: &[u8],
    ) -> Result<String, StorageError> {
        for counter in 1..=1000 {
            let filename = if counter == 1 {
                format!("{}.{}", base, extension)
            } else {
                format!("{}_{}.{}", base, counter, extension)
            };
            let path = dir_path.join(&filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: path.clone(),
                            source: e,
                        })?;
                    return Ok(filename);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }
        Err(StorageError::InvalidKey(format!(
            "too many assets named {} in {}",
            base,
            dir_path.display()
        )))
    }
}

/// Preferred file extension for a content type.
fn extension_for(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    let known = match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    };
    known
        .map(str::to_string)
        .or_else(|| {
            mime_guess::get_mime_extensions_str(&essence)
                .and_then(|exts| exts.first())
                .map(|e| e.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// Keeps generation ids usable as file names.
fn file_stem(generation_id: &str) -> String {
    let stem: String = generation_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if stem.is_empty() {
        "asset".to_string()
    } else {
        stem
    }
}

impl AssetStorage for FileSystemAssetStorage {
    fn save(&self, bytes: &[u8], metadata: &AssetMetadata) -> Result<StoredAsset, StorageError> {
        let now = Utc::now();
        let relative_dir = format!("{:04}/{:02}", now.year(), now.month());
        let dir_path = self.root.join(&relative_dir);
        self.ensure_directory(&dir_path)?;

        let filename = self.create_exclusive(
            &dir_path,
            &file_stem(&metadata.generation_id),
            &extension_for(&metadata.content_type),
            bytes,
        )?;
        let key = format!("{}/{}", relative_dir, filename);

        log::debug!(
            "Stored {} bytes ({}) for generation {} at {}",
            bytes.len(),
            metadata.content_type,
            metadata.generation_id,
            key
        );

        Ok(StoredAsset {
            url: format!("{}{}", self.url_prefix(), key),
            key,
            size_bytes: bytes.len() as u64,
        })
    }

    fn read(&self, key: &str) -> Result<(Vec<u8>, String), StorageError> {
        validate_key(key)?;
        let path = self.root.join(key);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::ReadFile { path, source: e }
            }
        })?;
        let content_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok((bytes, content_type))
    }

    fn signed_url(&self, url: &str) -> String {
        let Some(key) = url.strip_prefix(&self.url_prefix()) else {
            return url.to_string();
        };
        // Already signed or carrying some other query: leave it alone.
        if key.contains('?') {
            return url.to_string();
        }
        match self.signer.sign_at(key, Utc::now()) {
            Ok((expires, signature)) => {
                format!("{}?expires={}&signature={}", url, expires, signature)
            }
            Err(e) => {
                log::warn!("Failed to sign asset URL for {}: {}", key, e);
                url.to_string()
            }
        }
    }

    fn verify(&self, key: &str, expires: i64, signature: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.signer.verify_at(key, expires, signature, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileSystemAssetStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileSystemAssetStorage::new(
            dir.path(),
            "http://localhost:8080/",
            UrlSigner::new(SecretString::from("s3cret"), 600),
        );
        (dir, storage)
    }

    fn meta(generation_id: &str, content_type: &str) -> AssetMetadata {
        AssetMetadata {
            generation_id: generation_id.to_string(),
            content_type: content_type.to_string(),
        }
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{}=", name)))
            .unwrap()
    }

    #[test]
    fn test_save_and_read() {
        let (_dir, storage) = setup();
        let stored = storage.save(b"png-bytes", &meta("gen-1", "image/png")).unwrap();

        assert!(stored.key.ends_with("/gen-1.png"));
        assert_eq!(stored.url, format!("http://localhost:8080/assets/{}", stored.key));
        assert_eq!(stored.size_bytes, 9);

        let (bytes, content_type) = storage.read(&stored.key).unwrap();
        assert_eq!(bytes, b"png-bytes");
        assert_eq!(content_type, "image/png");
    }

    #[test]
    fn test_save_conflict_gets_suffix() {
        let (_dir, storage) = setup();
        let first = storage.save(b"a", &meta("gen-1", "image/png")).unwrap();
        let second = storage.save(b"b", &meta("gen-1", "image/png")).unwrap();
        assert_ne!(first.key, second.key);
        assert!(second.key.ends_with("/gen-1_2.png"));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("video/mp4; codecs=avc1"), "mp4");
        assert_eq!(extension_for("application/x-unknown-thing"), "bin");
    }

    #[test]
    fn test_read_missing_and_invalid() {
        let (_dir, storage) = setup();
        assert!(matches!(
            storage.read("2026/01/none.png"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.read("../secret"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_signed_url_round_trip() {
        let (_dir, storage) = setup();
        let stored = storage.save(b"x", &meta("gen-2", "image/png")).unwrap();

        let signed = storage.signed_url(&stored.url);
        assert_eq!(signed, storage.signed_url(&stored.url));
        let expires: i64 = query_param(&signed, "expires").parse().unwrap();
        let signature = query_param(&signed, "signature");
        storage.verify(&stored.key, expires, signature).unwrap();
        assert!(storage.verify("2026/01/other.png", expires, signature).is_err());

        // Re-signing a signed URL is a no-op.
        assert_eq!(storage.signed_url(&signed), signed);
    }

    #[test]
    fn test_foreign_urls_unsigned() {
        let (_dir, storage) = setup();
        let remote = "https://cdn.example/v.mp4";
        assert_eq!(storage.signed_url(remote), remote);
    }
}
