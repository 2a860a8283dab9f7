/// Sources module
///
/// The token endpoint contract: how the request URL is built and what a
/// single fetch can return. `http` holds the reqwest-backed fetcher.
use std::future::Future;

use reqwest::Url;

use crate::error::TokenError;

pub mod http;

pub use http::HttpFetcher;

pub const GRANT_TYPE: &str = "client_credential";

/// Outcome of one GET against the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success { value: String, expires_in_seconds: i64 },
    TransportError(String),
    UnexpectedStatus { code: u16 },
    ApplicationError { code: i64, message: String },
}

impl FetchResult {
    /// Split into the issued token or the error reported to observers.
    pub fn into_token(self) -> Result<(String, i64), TokenError> {
        match self {
            FetchResult::Success { value, expires_in_seconds } => Ok((value, expires_in_seconds)),
            FetchResult::TransportError(message) => Err(TokenError::Transport(message)),
            FetchResult::UnexpectedStatus { code } => Err(TokenError::UnexpectedStatus(code)),
            FetchResult::ApplicationError { code, message } => {
                Err(TokenError::Application { code, message })
            }
        }
    }
}

/// Performs the GET request for a prebuilt token URL.
///
/// Implementations hold no reference back to the manager and keep no state
/// between calls.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = FetchResult> + Send;
}

/// `<endpoint>?grant_type=client_credential&appid=<app_id>&secret=<secret>`
pub fn build_token_url(endpoint: &str, app_id: &str, secret: &str) -> Result<String, TokenError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| TokenError::Configuration(format!("invalid token endpoint '{}': {}", endpoint, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(TokenError::Configuration(format!(
            "token endpoint '{}' must use http or https",
            endpoint
        )));
    }

    url.query_pairs_mut()
        .clear()
        .append_pair("grant_type", GRANT_TYPE)
        .append_pair("appid", app_id)
        .append_pair("secret", secret);

    Ok(url.into())
}
