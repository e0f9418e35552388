//! Where credentials come from.
//!
//! The provider API key, the asset signing secret and the admin token each
//! accept an inline value, a file (Docker/Kubernetes secret mounts) or the
//! name of an environment variable. The first non-empty source wins, in that
//! order. File and env contents are trimmed.

use std::fs;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("no value, file or environment variable configured")]
    NoSourceProvided,

    #[error("cannot read secret file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("environment variable '{name}' is not set")]
    EnvVarNotSet { name: String },

    #[error("environment variable '{name}' is not valid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// The three optional places one secret may be configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub value: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

impl<'a> SecretSource<'a> {
    pub fn new(value: Option<&'a str>, file: Option<&'a str>, env_var: Option<&'a str>) -> Self {
        Self {
            value,
            file,
            env_var,
        }
    }

    pub fn is_configured(&self) -> bool {
        non_empty(self.value).is_some()
            || non_empty(self.file).is_some()
            || non_empty(self.env_var).is_some()
    }

    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = non_empty(self.value) {
            return Ok(SecretString::from(value.to_string()));
        }
        if let Some(path) = non_empty(self.file) {
            let path = expand_home(path);
            let content = fs::read_to_string(&path)
                .map_err(|source| SecretError::FileReadError { path, source })?;
            return Ok(SecretString::from(content.trim().to_string()));
        }
        if let Some(name) = non_empty(self.env_var) {
            return std::env::var(name)
                .map(|v| SecretString::from(v.trim().to_string()))
                .map_err(|e| match e {
                    std::env::VarError::NotPresent => SecretError::EnvVarNotSet {
                        name: name.to_string(),
                    },
                    std::env::VarError::NotUnicode(_) => SecretError::EnvVarNotUnicode {
                        name: name.to_string(),
                    },
                });
        }
        Err(SecretError::NoSourceProvided)
    }

    /// `Ok(None)` when nothing is configured. A configured source that cannot
    /// be read is still an error.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Expands a leading `~` to the user's home directory. `~user` is not supported.
pub(crate) fn expand_home(path: &str) -> String {
    let Some(rest) = path.strip_prefix('~') else {
        return path.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return path.to_string();
    }
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}
