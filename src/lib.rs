//! # WeChat Access Token Library
//!
//! Keeps one WeChat official-account access token fresh: fetches it from
//! the token endpoint, renews it ahead of expiry, retries failed fetches
//! and fans lifecycle events out to subscribers.
//!
//! Modules:
//! - `manager` — renewal schedule, forced refresh, events
//! - `sources` — token endpoint contract and the reqwest fetcher
//! - `cache` — the stored credential
//! - `config` — YAML service configuration and validation
//! - `sinks`, `server` — local HTTP surface serving the token

pub mod error;
pub mod config;
pub mod cache;
pub mod sources;
pub mod resilience;
pub mod manager;
pub mod observability;
pub mod server;
pub mod sinks;
pub mod helpers;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::credential::Credential;
pub use crate::config::types::{ManagerConfig, ServiceConfig};
pub use crate::error::TokenError;
pub use crate::manager::{ManagerStatus, PendingToken, TokenEvent, TokenManager};
pub use crate::sources::{FetchResult, Fetcher, HttpFetcher};
