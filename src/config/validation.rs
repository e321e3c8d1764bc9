use crate::config::types::{ApiConfig, ArchiveConfig, Config, RetryConfig, RunnerConfig};
use crate::ConfigError;
use chrono_tz::Tz;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_archive_config(&config.archive)?;
    validate_retry_config("retry.page", &config.retry.page)?;
    validate_retry_config("retry.day", &config.retry.day)?;
    validate_runner_config(&config.runner)?;
    Ok(())
}

/// Validates remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api-key-env cannot be empty".to_string(),
        ));
    }

    if config.page_limit < 1 || config.page_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "page-limit must be between 1 and 100, got {}",
            config.page_limit
        )));
    }

    if config.insight_page_limit < 1 || config.insight_page_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "insight-page-limit must be between 1 and 100, got {}",
            config.insight_page_limit
        )));
    }

    if config.max_insight_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-insight-pages must be >= 1, got {}",
            config.max_insight_pages
        )));
    }

    if config.max_pages_per_day < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages-per-day must be >= 1, got {}",
            config.max_pages_per_day
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 32 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 32, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates archive configuration
fn validate_archive_config(config: &ArchiveConfig) -> Result<(), ConfigError> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "archive root cannot be empty".to_string(),
        ));
    }

    config
        .timezone
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(config.timezone.clone()))?;

    if config.initial_lookback_days < 1 {
        return Err(ConfigError::Validation(format!(
            "initial-lookback-days must be >= 1, got {}",
            config.initial_lookback_days
        )));
    }

    if let Some(path) = &config.ledger_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "ledger-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates one retry level
fn validate_retry_config(section: &str, config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.max-attempts must be >= 1, got {}",
            section, config.max_attempts
        )));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "{}.max-delay-ms ({}) must be >= base-delay-ms ({})",
            section, config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

/// Validates runner configuration
fn validate_runner_config(config: &RunnerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_days < 1 || config.max_concurrent_days > 31 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-days must be between 1 and 31, got {}",
            config.max_concurrent_days
        )));
    }

    if config.max_passes_per_day < 1 {
        return Err(ConfigError::Validation(format!(
            "max-passes-per-day must be >= 1, got {}",
            config.max_passes_per_day
        )));
    }

    if config.kinds.is_empty() {
        return Err(ConfigError::Validation(
            "runner.kinds must name at least one artifact kind".to_string(),
        ));
    }

    Ok(())
}
