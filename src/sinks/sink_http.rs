use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::credential::Credential;
use crate::helpers::time::now;
use crate::manager::TokenManager;
use crate::server::server::AppState;
use crate::sources::Fetcher;

pub const TOKEN_PATH: &str = "/token";
pub const REFRESH_PATH: &str = "/token/refresh";
pub const STATUS_PATH: &str = "/status";

/// Routes handing the managed token to local consumers.
pub struct SinkHttpState<F: Fetcher> {
    manager: TokenManager<F>,
    refresh_timeout: Duration,
}

impl<F: Fetcher> Clone for SinkHttpState<F> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            refresh_timeout: self.refresh_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenBody {
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

impl TokenBody {
    fn from_credential(credential: Credential, now: DateTime<Utc>) -> Self {
        Self {
            expires_in: credential.expires_in_seconds(now),
            access_token: credential.value,
            issued_at: credential.issued_at,
            expires_at: credential.expires_at,
        }
    }
}

impl<F: Fetcher> SinkHttpState<F> {
    pub fn new(manager: TokenManager<F>, refresh_timeout_ms: u64) -> Self {
        Self {
            manager,
            refresh_timeout: Duration::from_millis(refresh_timeout_ms),
        }
    }

    pub fn router(&self) -> Router<AppState<F>> {
        info!("served paths: {}, {}, {}", TOKEN_PATH, REFRESH_PATH, STATUS_PATH);
        Router::new()
            .route(TOKEN_PATH, get(get_token::<F>))
            .route(REFRESH_PATH, post(post_refresh::<F>))
            .route(STATUS_PATH, get(get_status::<F>))
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn current_token<F: Fetcher>(manager: &TokenManager<F>) -> Option<TokenBody> {
    let now = now();
    manager
        .credential()
        .await
        .filter(|credential| credential.is_valid(now))
        .map(|credential| TokenBody::from_credential(credential, now))
}

async fn get_token<F: Fetcher>(State(state): State<AppState<F>>) -> Response {
    match current_token(&state.sink_http_state.manager).await {
        Some(body) => Json(body).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "no valid access token"),
    }
}

/// Force a refresh and answer with the renewed token.
async fn post_refresh<F: Fetcher>(State(state): State<AppState<F>>) -> Response {
    let sink = &state.sink_http_state;
    let pending = sink.manager.refresh().await;

    match tokio::time::timeout(sink.refresh_timeout, pending).await {
        Ok(Ok(token)) => Json(refreshed_token(&sink.manager, token).await).into_response(),
        Ok(Err(e)) if !e.is_recoverable() => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
        Ok(Err(e)) => error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
        Err(_) => {
            warn!(timeout_ms = sink.refresh_timeout.as_millis() as u64, "forced refresh timed out");
            error_response(StatusCode::GATEWAY_TIMEOUT, "token refresh timed out")
        }
    }
}

/// Body for the token a refresh resolved with. The slot only supplies the
/// validity window while it still holds that same token.
async fn refreshed_token<F: Fetcher>(manager: &TokenManager<F>, token: String) -> Value {
    let now = now();
    match manager.credential().await {
        Some(credential) if credential.value == token => {
            json!(TokenBody::from_credential(credential, now))
        }
        _ => json!({ "access_token": token }),
    }
}

async fn get_status<F: Fetcher>(State(state): State<AppState<F>>) -> Response {
    Json(state.sink_http_state.manager.status().await).into_response()
}
