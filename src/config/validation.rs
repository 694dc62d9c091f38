use crate::config::types::{
    AnalysisConfig, Config, ExtractionConfig, FetcherConfig, HandlerKind, PoolConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_pool_config(&config.pool)?;
    validate_extraction_config(&config.extraction)?;
    validate_analysis_config(&config.analysis)?;

    if config.retry.max_tries < 1 {
        return Err(ConfigError::Validation(format!(
            "retry.max-tries must be >= 1, got {}",
            config.retry.max_tries
        )));
    }

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "storage.database-path cannot be empty".to_string(),
        ));
    }

    if config.queue.path.is_empty() {
        return Err(ConfigError::Validation(
            "queue.path cannot be empty".to_string(),
        ));
    }

    if config.pipeline.concurrency < 1 || config.pipeline.concurrency > 256 {
        return Err(ConfigError::Validation(format!(
            "pipeline.concurrency must be between 1 and 256, got {}",
            config.pipeline.concurrency
        )));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetcher.timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetcher.user-agent cannot be empty".to_string(),
        ));
    }

    for pattern in &config.rendered_domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

fn validate_pool_config(config: &PoolConfig) -> Result<(), ConfigError> {
    if config.size < 1 || config.size > 64 {
        return Err(ConfigError::Validation(format!(
            "pool.size must be between 1 and 64, got {}",
            config.size
        )));
    }

    if config.restart_threshold < 1 {
        return Err(ConfigError::Validation(
            "pool.restart-threshold must be >= 1".to_string(),
        ));
    }

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "pool.navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    for entry in &config.handlers {
        validate_domain_pattern(&entry.domain)?;

        if entry.kind == HandlerKind::Selectors && entry.body.is_none() {
            return Err(ConfigError::Validation(format!(
                "Selector handler for '{}' must define a body selector",
                entry.domain
            )));
        }

        let selectors = [&entry.title, &entry.author, &entry.publish_date, &entry.body];
        for selector in selectors.into_iter().flatten() {
            Selector::parse(selector).map_err(|_| {
                ConfigError::Validation(format!(
                    "Invalid CSS selector '{}' for handler '{}'",
                    selector, entry.domain
                ))
            })?;
        }
    }

    Ok(())
}

fn validate_analysis_config(config: &AnalysisConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid analysis.base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "analysis.base-url must be http(s), got '{}'",
            config.base_url
        )));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "analysis.model cannot be empty".to_string(),
        ));
    }

    if config.max_input_chars < 1 {
        return Err(ConfigError::Validation(
            "analysis.max-input-chars must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
