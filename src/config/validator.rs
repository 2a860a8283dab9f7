//! Config validation with aggregated errors.
//! Every issue found is collected so a broken file is reported in one pass.

use reqwest::Url;
use tracing::{error, info};

use crate::config::settings::{LoggingConfig, RetryConfig, SettingsConfig};
use crate::config::types::{ManagerConfig, ServiceConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_manager(&cfg.manager, &mut errors);

    if errors.is_empty() {
        info!("config is valid");
        Ok(())
    } else {
        for e in &errors {
            error!("config error: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(logging) = &settings.logging {
        validate_logging(logging, errors);
    }

    if !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }

    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' is not a valid port",
            settings.server.port
        ));
    }
    if settings.server.refresh_timeout_ms == 0 {
        errors.push("settings.server.refresh_timeout_ms must be > 0".to_string());
    }
}

fn validate_logging(logging: &LoggingConfig, errors: &mut Vec<String>) {
    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        errors.push(format!(
            "settings.logging.level '{}' must be one of {:?}",
            logging.level, LOG_LEVELS
        ));
    }
}

fn validate_manager(manager: &ManagerConfig, errors: &mut Vec<String>) {
    if manager.app_id.trim().is_empty() {
        errors.push("manager.app_id must not be empty".to_string());
    }
    if manager.secret.trim().is_empty() {
        errors.push("manager.secret must not be empty".to_string());
    }

    match Url::parse(&manager.endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!(
            "manager.endpoint scheme '{}' is not http(s)",
            url.scheme()
        )),
        Err(e) => errors.push(format!(
            "manager.endpoint '{}' is not a valid url: {}",
            manager.endpoint, e
        )),
    }

    if manager.request_timeout_ms == 0 {
        errors.push("manager.request_timeout_ms must be > 0".to_string());
    }
    if manager.event_buffer == 0 {
        errors.push("manager.event_buffer must be > 0".to_string());
    }

    validate_retry(&manager.retry, errors);
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.delay_ms == Some(0) {
        errors.push("manager.retry.delay_ms must be > 0".to_string());
    }
    if retry.backoff_factor == Some(0) {
        errors.push("manager.retry.backoff_factor must be >= 1".to_string());
    }
    if let (Some(delay), Some(max)) = (retry.delay_ms, retry.max_delay_ms) {
        if max < delay {
            errors.push(format!(
                "manager.retry.max_delay_ms ({}) must be >= delay_ms ({})",
                max, delay
            ));
        }
    }
}
