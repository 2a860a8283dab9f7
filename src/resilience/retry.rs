use crate::config::settings::RetryConfig;

pub const RETRY_DELAY_MS_DEFAULT: u64 = 20_000;
pub const BACKOFF_FACTOR_DEFAULT: u32 = 1;

/// Delay applied after a failed fetch.
///
/// With the default factor of 1 every failure waits exactly `delay_ms`,
/// regardless of how many failures came before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay_ms: u64,
    /// multiplied into the delay for every consecutive failure after the first
    pub backoff_factor: u32,
    /// invariant: >= delay_ms
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(RETRY_DELAY_MS_DEFAULT)
    }
}

impl RetryPolicy {
    /// `0` means "not set" and falls back to the default delay.
    pub fn fixed(delay_ms: u64) -> Self {
        let delay_ms = if delay_ms == 0 { RETRY_DELAY_MS_DEFAULT } else { delay_ms };
        Self {
            delay_ms,
            backoff_factor: BACKOFF_FACTOR_DEFAULT,
            max_delay_ms: delay_ms,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let base = Self::fixed(config.delay_ms.unwrap_or(RETRY_DELAY_MS_DEFAULT));
        let backoff_factor = config.backoff_factor.unwrap_or(BACKOFF_FACTOR_DEFAULT).max(1);
        let max_delay_ms = config.max_delay_ms.unwrap_or(base.delay_ms).max(base.delay_ms);
        Self {
            backoff_factor,
            max_delay_ms,
            ..base
        }
    }

    /// Delay before the next attempt after `consecutive_failures` failures in a row.
    pub fn delay_for(&self, consecutive_failures: u32) -> u64 {
        if self.backoff_factor <= 1 || consecutive_failures <= 1 {
            return self.delay_ms;
        }
        let mut delay = self.delay_ms;
        for _ in 1..consecutive_failures {
            delay = delay.saturating_mul(self.backoff_factor as u64);
            if delay >= self.max_delay_ms {
                return self.max_delay_ms;
            }
        }
        delay
    }
}
