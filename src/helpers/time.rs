use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Delay used when a fetch should happen right away.
pub const IMMEDIATE_DELAY_MS: u64 = 1;

/// Renewal margin subtracted from the issuer-declared lifetime.
pub const SAFETY_MARGIN_SECONDS_DEFAULT: u64 = 120;

/// Milliseconds until the next renewal for a token living `expires_in_seconds`.
/// Lifetimes shorter than the margin renew immediately.
pub fn renewal_delay_ms(expires_in_seconds: i64, safety_margin_seconds: u64) -> u64 {
    let remaining = expires_in_seconds.saturating_sub(safety_margin_seconds as i64);
    if remaining <= 0 {
        return IMMEDIATE_DELAY_MS;
    }
    (remaining as u64).saturating_mul(1000)
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn get_instant() -> Instant {
    Instant::now()
}
