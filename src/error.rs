use thiserror::Error;

/// Name carried by every token error, as observed by `error` event consumers.
pub const TOKEN_ERROR_NAME: &str = "WeChatTokenError";

/// Errors produced while building a token manager or fetching a token.
///
/// Only `Configuration` is fatal. Every fetch failure is recoverable: it is
/// reported through the `error` event and followed by a scheduled retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Missing credentials or an unusable endpoint, raised at construction
    #[error("{0}")]
    Configuration(String),

    /// Network, DNS or body decoding failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP response from the token endpoint
    #[error("Unexpected Status Code: {0}")]
    UnexpectedStatus(u16),

    /// Issuer reported failure (`errcode` != 0)
    #[error("{message}")]
    Application { code: i64, message: String },

    /// The manager was stopped before the awaited token arrived
    #[error("token manager stopped")]
    Stopped,
}

impl TokenError {
    pub fn missing_credentials() -> Self {
        TokenError::Configuration("Missing Appid or Secret".to_owned())
    }

    pub fn name(&self) -> &'static str {
        TOKEN_ERROR_NAME
    }

    /// Issuer error code, present only for application errors.
    pub fn code(&self) -> Option<i64> {
        match self {
            TokenError::Application { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TokenError::Transport(_) | TokenError::UnexpectedStatus(_) | TokenError::Application { .. }
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Configuration(_) => "configuration",
            TokenError::Transport(_) => "transport",
            TokenError::UnexpectedStatus(_) => "status",
            TokenError::Application { .. } => "application",
            TokenError::Stopped => "stopped",
        }
    }
}
