use serde::Deserialize;

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::helpers::time::SAFETY_MARGIN_SECONDS_DEFAULT;

pub const TOKEN_ENDPOINT_DEFAULT: &str = "https://api.weixin.qq.com/cgi-bin/token";
pub const REQUEST_TIMEOUT_MS_DEFAULT: u64 = 5000;
pub const EVENT_BUFFER_DEFAULT: usize = 50;

/// ================================
/// Root of the YAML config file
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub manager: ManagerConfig,
}

/// ================================
/// Token manager
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ManagerConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub retry: RetryConfig,
    /// renew this many seconds before the issuer-declared expiry
    #[serde(default = "default_safety_margin_seconds")]
    pub safety_margin_seconds: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// capacity of the lifecycle event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl ManagerConfig {
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            endpoint: default_endpoint(),
            retry: RetryConfig::default(),
            safety_margin_seconds: default_safety_margin_seconds(),
            request_timeout_ms: default_request_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry.delay_ms = Some(delay_ms);
        self
    }
}

fn default_endpoint() -> String {
    TOKEN_ENDPOINT_DEFAULT.to_owned()
}

fn default_safety_margin_seconds() -> u64 {
    SAFETY_MARGIN_SECONDS_DEFAULT
}

fn default_request_timeout_ms() -> u64 {
    REQUEST_TIMEOUT_MS_DEFAULT
}

fn default_event_buffer() -> usize {
    EVENT_BUFFER_DEFAULT
}
