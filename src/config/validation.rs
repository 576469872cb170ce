use crate::config::types::{Config, CrawlerConfig, FetcherConfig, FilterEntry, UserAgentConfig};
use crate::ConfigError;
use regex::RegexBuilder;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_filters("url-filters", &config.url_filters)?;
    validate_filters("header-filters", &config.header_filters)?;
    validate_filters("document-filters", &config.document_filters)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.id.trim().is_empty() {
        return Err(ConfigError::Validation("crawler id cannot be empty".to_string()));
    }

    if config.start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "at least one start URL is required".to_string(),
        ));
    }

    for start_url in &config.start_urls {
        let url = Url::parse(start_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Start URL '{}' must use HTTP or HTTPS",
                start_url
            )));
        }
    }

    if config.num_threads < 1 || config.num_threads > 256 {
        return Err(ConfigError::Validation(format!(
            "num_threads must be between 1 and 256, got {}",
            config.num_threads
        )));
    }

    if config.max_depth < -1 {
        return Err(ConfigError::Validation(format!(
            "max_depth must be -1 (unlimited) or >= 0, got {}",
            config.max_depth
        )));
    }

    if config.max_urls < -1 {
        return Err(ConfigError::Validation(format!(
            "max_urls must be -1 (unlimited) or >= 0, got {}",
            config.max_urls
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Alphanumeric + hyphens keeps the name usable as a robots.txt agent token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetcher timeouts must be greater than zero".to_string(),
        ));
    }

    for code in config
        .valid_status_codes
        .iter()
        .chain(config.not_found_status_codes.iter())
    {
        if !(100..=599).contains(code) {
            return Err(ConfigError::Validation(format!(
                "HTTP status code {} is out of range",
                code
            )));
        }
    }

    if let Some(code) = config
        .valid_status_codes
        .iter()
        .find(|code| config.not_found_status_codes.contains(code))
    {
        return Err(ConfigError::Validation(format!(
            "status code {} cannot be both valid and not-found",
            code
        )));
    }

    Ok(())
}

/// Validates that every filter pattern compiles
fn validate_filters(section: &str, filters: &[FilterEntry]) -> Result<(), ConfigError> {
    for entry in filters {
        RegexBuilder::new(&entry.pattern)
            .case_insensitive(!entry.case_sensitive)
            .build()
            .map_err(|e| {
                ConfigError::InvalidPattern(format!(
                    "{} pattern '{}' does not compile: {}",
                    section, entry.pattern, e
                ))
            })?;

        if let Some(field) = &entry.field {
            if field.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{} field name cannot be blank",
                    section
                )));
            }
        }
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
