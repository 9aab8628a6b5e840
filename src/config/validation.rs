use crate::config::types::{
    AuthConfig, AuthStrategy, BrowserConfig, Config, CrawlSection, OutputConfig, ScopeConfig,
    SnapshotConfig,
};
use crate::url::compile_pattern;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_section(&config.crawl)?;
    if let Some(auth) = &config.crawl.auth {
        validate_auth_config(auth)?;
    }
    validate_scope_patterns(&config.crawl.scope)?;
    validate_snapshot_config(&config.crawl.snapshot)?;
    validate_browser_config(&config.browser)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl bounds and the base URL
fn validate_crawl_section(config: &CrawlSection) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.workers < 1 || config.workers > 32 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 32, got {}",
            config.workers
        )));
    }

    if config.page_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "page-timeout-ms must be >= 100ms, got {}ms",
            config.page_timeout_ms
        )));
    }

    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        return Err(ConfigError::Validation(format!(
            "similarity-threshold must be between 0.0 and 1.0, got {}",
            config.similarity_threshold
        )));
    }

    Ok(())
}

/// Validates that the chosen strategy carries usable credentials
fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    match config.strategy {
        AuthStrategy::Cookies => {
            if config.cookies.is_empty() {
                return Err(ConfigError::Validation(
                    "cookies auth needs at least one [[crawl.auth.cookies]] entry".to_string(),
                ));
            }
            for cookie in &config.cookies {
                if cookie.name.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "cookie name cannot be empty".to_string(),
                    ));
                }
                if let Some(domain) = &cookie.domain {
                    validate_cookie_domain(domain)?;
                }
            }
        }
        AuthStrategy::BearerToken => match (&config.token, &config.token_env) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "bearer-token auth takes either token or token-env, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(ConfigError::Validation(
                    "bearer-token auth needs token or token-env".to_string(),
                ));
            }
            (Some(token), None) if token.trim().is_empty() => {
                return Err(ConfigError::Validation("token cannot be empty".to_string()));
            }
            _ => {}
        },
    }

    Ok(())
}

/// Validates a cookie domain (a leading dot is allowed)
fn validate_cookie_domain(domain: &str) -> Result<(), ConfigError> {
    let host = domain.strip_prefix('.').unwrap_or(domain);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Cookie domain cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Cookie domain '{}' contains invalid characters",
            domain
        )));
    }

    if host.starts_with('-') || host.ends_with('-') || host.ends_with('.') || host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Cookie domain '{}' is malformed",
            domain
        )));
    }

    Ok(())
}

/// Scope patterns are route globs and must be anchored
fn validate_scope_patterns(config: &ScopeConfig) -> Result<(), ConfigError> {
    for pattern in config.include.iter().chain(&config.exclude) {
        if !(pattern.starts_with('/') || pattern.starts_with('*')) {
            return Err(ConfigError::InvalidPattern(format!(
                "Scope pattern '{}' must start with '/' or '*'",
                pattern
            )));
        }
        if let Err(e) = compile_pattern(pattern) {
            return Err(ConfigError::InvalidPattern(format!(
                "Scope pattern '{}' is not a valid glob: {}",
                pattern, e
            )));
        }
    }
    Ok(())
}

fn validate_snapshot_config(config: &SnapshotConfig) -> Result<(), ConfigError> {
    if config.quality < 1 || config.quality > 100 {
        return Err(ConfigError::Validation(format!(
            "snapshot quality must be between 1 and 100, got {}",
            config.quality
        )));
    }

    if config.max_width < 16 {
        return Err(ConfigError::Validation(format!(
            "snapshot max-width must be >= 16, got {}",
            config.max_width
        )));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(format!(
            "viewport must be non-empty, got {}x{}",
            config.viewport_width, config.viewport_height
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    let paths = [
        ("snapshot-dir", &config.snapshot_dir),
        ("database-path", &config.database_path),
        ("inventory-path", &config.inventory_path),
        ("summary-path", &config.summary_path),
    ];

    for (key, value) in paths {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
        }
    }

    Ok(())
}
