use std::path::Path;

use crate::config::schema::{AppConfig, LogFormat, ProviderKind};
use crate::error::ConfigError;

/// Loads configuration from a YAML file, applies `WHATIF_*` environment
/// overrides and validates the result. With no path, starts from defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            log::info!("Loading configuration from {}", path.display());
            parse_yaml(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Parses and validates YAML without consulting the environment.
pub fn load_config_from_str(content: &str) -> Result<AppConfig, ConfigError> {
    let config = parse_yaml(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn parse_yaml(content: &str) -> Result<AppConfig, ConfigError> {
    // An empty document deserializes to unit, not to a defaulted struct.
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Applies environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("WHATIF_BIND") {
        config.server.bind = v;
    }
    if let Some(v) = lookup("WHATIF_PUBLIC_BASE_URL") {
        config.server.public_base_url = v;
    }
    if let Some(v) = lookup("WHATIF_ADMIN_TOKEN") {
        config.server.admin_token = Some(v);
    }
    if let Some(v) = lookup("WHATIF_DATABASE_PATH") {
        config.database.path = Some(v);
    }
    if let Some(v) = lookup("WHATIF_STORAGE_DIR") {
        config.storage.directory = Some(v);
    }
    if let Some(v) = lookup("WHATIF_SIGNING_SECRET") {
        config.storage.signing_secret = Some(v);
    }
    if let Some(v) = lookup("WHATIF_PROVIDER") {
        config.provider.kind = ProviderKind::parse(&v).ok_or_else(|| invalid("WHATIF_PROVIDER", &v))?;
    }
    if let Some(v) = lookup("WHATIF_PROVIDER_BASE_URL") {
        config.provider.base_url = v;
    }
    if let Some(v) = lookup("WHATIF_RUNNER_AUTO_START") {
        config.runner.auto_start = parse_bool(&v).ok_or_else(|| invalid("WHATIF_RUNNER_AUTO_START", &v))?;
    }
    if let Some(v) = lookup("WHATIF_POLL_INTERVAL_SECS") {
        config.runner.poll_interval_secs =
            v.parse().map_err(|_| invalid("WHATIF_POLL_INTERVAL_SECS", &v))?;
    }
    if let Some(v) = lookup("WHATIF_POLICY_STRICT") {
        config.policy.strict_mode = parse_bool(&v).ok_or_else(|| invalid("WHATIF_POLICY_STRICT", &v))?;
    }
    if let Some(v) = lookup("WHATIF_LOG_FORMAT") {
        config.logging.format = LogFormat::parse(&v).ok_or_else(|| invalid("WHATIF_LOG_FORMAT", &v))?;
    }
    if let Some(v) = lookup("WHATIF_LOG_LEVEL") {
        config.logging.level = v;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let fail = |message: String| -> Result<(), ConfigError> {
        Err(ConfigError::Validation { message })
    };

    let base = &config.server.public_base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return fail(format!("server.public_base_url must be an http(s) URL, got '{}'", base));
    }

    if config.planner.max_attempts == 0 {
        return fail("planner.max_attempts must be at least 1".to_string());
    }
    let threshold = config.planner.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return fail(format!(
            "planner.confidence_threshold must be within [0, 1], got {}",
            threshold
        ));
    }

    if config.runner.poll_interval_secs == 0 || config.runner.video_poll_interval_secs == 0 {
        return fail("runner poll intervals must be greater than zero".to_string());
    }
    if config.runner.video_max_poll_attempts == 0 {
        return fail("runner.video_max_poll_attempts must be at least 1".to_string());
    }

    if config.storage.url_ttl_secs == 0 {
        return fail("storage.url_ttl_secs must be greater than zero".to_string());
    }

    let provider = &config.provider;
    if provider.kind == ProviderKind::Gemini && !provider.api_key_source().is_configured() {
        return fail("provider.kind 'gemini' requires api_key, api_key_file or api_key_env_var".to_string());
    }

    for (name, model) in [
        ("text_model", &provider.text_model),
        ("image_model", &provider.image_model),
        ("video_model", &provider.video_model),
    ] {
        if model.trim().is_empty() {
            return fail(format!("provider.{} must not be empty", name));
        }
    }

    Ok(())
}
