use crate::config::types::{AnalysisConfig, Config};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use press_sieve::config::load_config;
///
/// let config = load_config(Path::new("press-sieve.toml")).unwrap();
/// println!("Pool size: {}", config.pool.size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Every batch run records the hash of the configuration that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Resolves the analysis-service API key
///
/// An inline `api-key` wins over `api-key-env`. A missing key is fatal at
/// startup and must never be discovered per item.
pub fn resolve_api_key(config: &AnalysisConfig) -> Result<String, ConfigError> {
    if let Some(key) = config.api_key.as_deref().map(str::trim) {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    if let Some(var) = &config.api_key_env {
        return match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(ConfigError::MissingCredential(format!(
                "environment variable {} is not set",
                var
            ))),
        };
    }

    Err(ConfigError::MissingCredential(
        "analysis.api-key or analysis.api-key-env must be set".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[fetcher]
timeout-secs = 10
rendered-domains = ["36kr.com", "*.spa-news.com"]

[pool]
size = 2
restart-threshold = 50

[analysis]
base-url = "https://llm.example.com/v1"
model = "summarizer"
api-key = "secret"
taxonomy = ["Technology", "Business"]

[storage]
database-path = "./articles.db"

[[extraction.handlers]]
domain = "blog.example.com"
kind = "selectors"
title = "h1.headline"
body = "div.post-body"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.fetcher.timeout_secs, 10);
        assert_eq!(config.fetcher.rendered_domains.len(), 2);
        assert_eq!(config.pool.size, 2);
        assert_eq!(config.pool.restart_threshold, 50);
        assert_eq!(config.analysis.taxonomy.len(), 2);
        assert_eq!(config.extraction.handlers.len(), 1);
        assert_eq!(config.retry.max_tries, 3);
        assert_eq!(config.pipeline.concurrency, 8);
        assert!(!config.storage.keep_source_html);
    }

    #[test]
    fn test_defaults_applied() {
        let config_content = r#"
[analysis]
api-key = "secret"

[storage]
database-path = "./articles.db"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.fetcher.timeout_secs, 30);
        assert_eq!(config.fetcher.rendered_domains, vec!["36kr.com".to_string()]);
        assert_eq!(config.pool.restart_threshold, 1000);
        assert_eq!(config.retry.delay_ms, 2000);
        assert_eq!(config.analysis.max_input_chars, 3500);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/press-sieve.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[pool]
size = 0

[analysis]
api-key = "secret"

[storage]
database-path = "./articles.db"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_resolve_inline_api_key() {
        let config = AnalysisConfig {
            api_key: Some("  sk-inline  ".to_string()),
            ..AnalysisConfig::default()
        };
        assert_eq!(resolve_api_key(&config).unwrap(), "sk-inline");
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        std::env::set_var("PRESS_SIEVE_TEST_KEY_PRESENT", "sk-env");
        let config = AnalysisConfig {
            api_key_env: Some("PRESS_SIEVE_TEST_KEY_PRESENT".to_string()),
            ..AnalysisConfig::default()
        };
        assert_eq!(resolve_api_key(&config).unwrap(), "sk-env");
    }

    #[test]
    fn test_missing_api_key_is_configuration_failure() {
        let config = AnalysisConfig {
            api_key_env: Some("PRESS_SIEVE_TEST_KEY_ABSENT".to_string()),
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            resolve_api_key(&config),
            Err(ConfigError::MissingCredential(_))
        ));

        assert!(matches!(
            resolve_api_key(&AnalysisConfig::default()),
            Err(ConfigError::MissingCredential(_))
        ));
    }
}
