use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::TokenError;
use crate::sources::{FetchResult, Fetcher};

/// Body returned by the token endpoint, success and failure share one shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    errcode: i64,
    errmsg: Option<String>,
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout_ms: u64) -> Result<Self, TokenError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| TokenError::Configuration(format!("failed to build http client: {}", e)))?;
        Ok(Self::new(client))
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return FetchResult::TransportError(e.without_url().to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::UnexpectedStatus { code: status.as_u16() };
        }

        match response.text().await {
            Ok(body) => classify_body(&body),
            Err(e) => FetchResult::TransportError(e.without_url().to_string()),
        }
    }
}

/// Classify a 2xx body as an issued token, an issuer error, or a malformed reply.
pub fn classify_body(body: &str) -> FetchResult {
    let parsed: TokenResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("token response is not valid json: {}", e);
            return FetchResult::TransportError(format!("invalid token response: {}", e));
        }
    };

    if parsed.errcode != 0 {
        return FetchResult::ApplicationError {
            code: parsed.errcode,
            message: parsed.errmsg.unwrap_or_default(),
        };
    }

    match (parsed.access_token, parsed.expires_in) {
        (Some(value), Some(expires_in_seconds)) if !value.is_empty() => {
            FetchResult::Success { value, expires_in_seconds }
        }
        _ => FetchResult::TransportError(
            "token response is missing access_token or expires_in".to_owned(),
        ),
    }
}
