use crate::config::types::{Config, CrawlerConfig, OutputConfig, RootConfig, UserAgentConfig};
use crate::target::CrawlScope;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_root_config(&config.root)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the root container and its entry points
fn validate_root_config(config: &RootConfig) -> Result<(), ConfigError> {
    if config.root_id.is_empty() {
        return Err(ConfigError::Validation(
            "root-id cannot be empty".to_string(),
        ));
    }

    let scope = CrawlScope::new(&config.base_url, &config.root_id)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if config.entry_points.is_empty() {
        return Err(ConfigError::Validation(
            "At least one entry point is required".to_string(),
        ));
    }

    for entry in &config.entry_points {
        scope.entry_target(&entry.path).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid entry point '{}': {}", entry.path, e))
        })?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_navigation_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-navigation-attempts must be >= 1, got {}",
            config.max_navigation_attempts
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.navigation_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "navigation-timeout-ms must be >= 1000ms, got {}ms",
            config.navigation_timeout_ms
        )));
    }

    if config.fetch_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "fetch-timeout-ms must be >= 1000ms, got {}ms",
            config.fetch_timeout_ms
        )));
    }

    if config.resolver_concurrency < 1 || config.resolver_concurrency > 8 {
        return Err(ConfigError::Validation(format!(
            "resolver-concurrency must be between 1 and 8, got {}",
            config.resolver_concurrency
        )));
    }

    if config.politeness_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "politeness-delay-ms must be >= 100ms, got {}ms",
            config.politeness_delay_ms
        )));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "progress-interval must be >= 1, got {}",
            config.progress_interval
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config.name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    if config.version.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent version cannot be empty".to_string(),
        ));
    }

    // Validate contact URL
    if config.contact_url.is_empty() {
        return Err(ConfigError::Validation(
            "contact-url cannot be empty".to_string(),
        ));
    }
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
