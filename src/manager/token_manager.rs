use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::credential::Credential;
use crate::config::types::ManagerConfig;
use crate::error::TokenError;
use crate::helpers::time::{get_instant, now, renewal_delay_ms, IMMEDIATE_DELAY_MS};
use crate::manager::events::{PendingToken, TokenEvent};
use crate::manager::schedule::ScheduleState;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::resilience::retry::RetryPolicy;
use crate::sources::{build_token_url, Fetcher, HttpFetcher};

const DISPATCHED: &str = "dispatched";
const COALESCED: &str = "coalesced";

/// Keeps one access token fresh.
///
/// Every clone drives the same state. The first fetch happens 1 ms after
/// `start()`; a successful fetch schedules the next one at expiry minus the
/// safety margin, a failed one schedules a retry. At most one timer, and so
/// at most one fetch, is outstanding at any time.
///
/// Dropping every handle cancels the schedule once no fetch is in flight;
/// call `stop()` to cancel it immediately.
pub struct TokenManager<F: Fetcher = HttpFetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetcher> Clone for TokenManager<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<F> {
    app_id: String,
    /// carries the secret, never log it
    token_url: String,
    retry: RetryPolicy,
    safety_margin_seconds: u64,
    fetcher: F,
    events: broadcast::Sender<TokenEvent>,
    state: Mutex<ManagerState>,
}

#[derive(Default)]
struct ManagerState {
    credential: Option<Credential>,
    schedule: ScheduleState,
    /// one-shot listeners for the next token
    waiters: Vec<oneshot::Sender<String>>,
    last_error: Option<TokenError>,
    consecutive_failures: u32,
    started: bool,
    /// a timer was armed since the last stop
    active: bool,
    /// bumped on every arm and on stop; a timer only acts if it still matches
    generation: u64,
}

/// Serializable snapshot of the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub app_id: String,
    pub started: bool,
    pub refreshing: bool,
    pub timer_armed: bool,
    pub delay_ms: u64,
    pub retry_delay_ms: u64,
    pub has_valid_token: bool,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub renew_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl TokenManager<HttpFetcher> {
    /// Manager for the default WeChat endpoint. A missing or zero
    /// `retry_delay_ms` means 20 seconds.
    pub fn new(app_id: &str, secret: &str, retry_delay_ms: Option<u64>) -> Result<Self, TokenError> {
        let mut config = ManagerConfig::new(app_id, secret);
        config.retry.delay_ms = retry_delay_ms;
        Self::from_config(&config)
    }

    pub fn from_config(config: &ManagerConfig) -> Result<Self, TokenError> {
        check_credentials(config)?;
        let fetcher = HttpFetcher::with_timeout(config.request_timeout_ms)?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: Fetcher> TokenManager<F> {
    pub fn with_fetcher(config: &ManagerConfig, fetcher: F) -> Result<Self, TokenError> {
        check_credentials(config)?;
        let token_url = build_token_url(&config.endpoint, &config.app_id, &config.secret)?;
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        Ok(Self {
            inner: Arc::new(Inner {
                app_id: config.app_id.clone(),
                token_url,
                retry: RetryPolicy::from_config(&config.retry),
                safety_margin_seconds: config.safety_margin_seconds,
                fetcher,
                events,
                state: Mutex::new(ManagerState::default()),
            }),
        })
    }

    /// Arm the schedule with the current delay and emit `start`.
    /// Calling it again re-arms and emits `start` again.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        state.started = true;
        self.inner.arm(&mut state);
        info!(
            app_id = %self.inner.app_id,
            delay_ms = state.schedule.delay_ms,
            "token manager started"
        );
        self.inner.emit(TokenEvent::Start);
    }

    /// Cancel pending work, forget the token and emit `stop`.
    ///
    /// A fetch already in flight is aborted and its result, should it still
    /// arrive, is discarded. Pending one-shot listeners resolve with
    /// `TokenError::Stopped`. `stop` is emitted once per active period, which
    /// begins with `start` or a forced refresh; stopping an idle manager only
    /// re-clears its state.
    pub async fn stop(&self) {
        let metrics = get_metrics().await;
        let mut state = self.inner.state.lock().await;
        state.schedule.reset();
        state.generation += 1;
        state.credential = None;
        state.waiters.clear();
        state.last_error = None;
        state.consecutive_failures = 0;
        metrics.token_expiry_unix.set(0);

        state.started = false;
        if std::mem::take(&mut state.active) {
            info!(app_id = %self.inner.app_id, "token manager stopped");
            self.inner.emit(TokenEvent::Stop);
        }
    }

    /// Force a fetch right away, for callers whose token was rejected downstream.
    ///
    /// The returned listener resolves with the next issued token. While a
    /// forced refresh is outstanding, further calls join it instead of
    /// dispatching another fetch; this holds across failed attempts until a
    /// fetch succeeds.
    pub async fn refresh(&self) -> PendingToken {
        let metrics = get_metrics().await;
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.state.lock().await;
        state.waiters.push(tx);

        if state.schedule.refreshing {
            debug!(app_id = %self.inner.app_id, "forced refresh already in flight");
            metrics.forced_refreshes.with_label_values(&[COALESCED]).inc();
            return PendingToken::new(rx, true);
        }

        state.schedule.refreshing = true;
        state.schedule.delay_ms = IMMEDIATE_DELAY_MS;
        self.inner.arm(&mut state);
        metrics.forced_refreshes.with_label_values(&[DISPATCHED]).inc();
        info!(app_id = %self.inner.app_id, "forced refresh scheduled");
        PendingToken::new(rx, false)
    }

    /// Callback form of `refresh`. Returns true when the request joined a
    /// refresh already in flight. The callback is dropped unrun if the
    /// manager stops first.
    pub async fn refresh_with<C>(&self, callback: C) -> bool
    where
        C: FnOnce(String) + Send + 'static,
    {
        let pending = self.refresh().await;
        let coalesced = pending.is_coalesced();
        tokio::spawn(async move {
            if let Ok(token) = pending.await {
                callback(token);
            }
        });
        coalesced
    }

    /// One-shot listener for the next token, without forcing a fetch.
    pub async fn next_token(&self) -> PendingToken {
        let (tx, rx) = oneshot::channel();
        self.inner.state.lock().await.waiters.push(tx);
        PendingToken::new(rx, false)
    }

    /// Persistent listener for every lifecycle event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.inner.events.subscribe()
    }

    pub async fn delay_ms(&self) -> u64 {
        self.inner.state.lock().await.schedule.delay_ms
    }

    pub fn retry_delay_ms(&self) -> u64 {
        self.inner.retry.delay_ms
    }

    pub async fn is_refreshing(&self) -> bool {
        self.inner.state.lock().await.schedule.refreshing
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.inner.state.lock().await.credential.clone()
    }

    /// Current token, if one is held and has not expired yet.
    pub async fn access_token(&self) -> Option<String> {
        let state = self.inner.state.lock().await;
        state
            .credential
            .as_ref()
            .filter(|credential| credential.is_valid(now()))
            .map(|credential| credential.value.clone())
    }

    pub async fn last_error(&self) -> Option<TokenError> {
        self.inner.state.lock().await.last_error.clone()
    }

    pub async fn status(&self) -> ManagerStatus {
        let state = self.inner.state.lock().await;
        let credential = state.credential.as_ref();
        ManagerStatus {
            app_id: self.inner.app_id.clone(),
            started: state.started,
            refreshing: state.schedule.refreshing,
            timer_armed: state.schedule.is_armed(),
            delay_ms: state.schedule.delay_ms,
            retry_delay_ms: self.inner.retry.delay_ms,
            has_valid_token: credential.is_some_and(|c| c.is_valid(now())),
            issued_at: credential.map(|c| c.issued_at),
            expires_at: credential.map(|c| c.expires_at),
            renew_at: credential.map(|c| c.renew_at(self.inner.safety_margin_seconds)),
            consecutive_failures: state.consecutive_failures,
            last_error: state.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}

fn gauge_value(delay_ms: u64) -> i64 {
    i64::try_from(delay_ms).unwrap_or(i64::MAX)
}

fn check_credentials(config: &ManagerConfig) -> Result<(), TokenError> {
    if config.app_id.trim().is_empty() || config.secret.trim().is_empty() {
        return Err(TokenError::missing_credentials());
    }
    Ok(())
}

impl<F: Fetcher> Inner<F> {
    /// Replace the pending timer with one firing after the current delay.
    fn arm(self: &Arc<Self>, state: &mut ManagerState) {
        state.generation += 1;
        state.active = true;
        let generation = state.generation;
        let delay = Duration::from_millis(state.schedule.delay_ms);
        debug!(delay_ms = state.schedule.delay_ms, generation, "token fetch scheduled");

        let inner: Weak<Self> = Arc::downgrade(self);
        state.schedule.replace_timer(tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                inner.fire(generation).await;
            }
        }));
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        let metrics = get_metrics().await;
        metrics.fetch_requests.inc();
        let start = get_instant();
        debug!(app_id = %self.app_id, "fetching access token");

        let result = self.fetcher.fetch(&self.token_url).await;
        metrics.fetch_duration.observe(start.elapsed().as_secs_f64());

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(generation, current = state.generation, "discarding superseded fetch result");
            return;
        }
        state.schedule.release_fired();

        match result.into_token() {
            Ok((value, expires_in_seconds)) => {
                self.set_credential(&mut state, value, expires_in_seconds, metrics)
            }
            Err(error) => self.retry(&mut state, error, metrics),
        }
    }

    /// Sole writer of the credential.
    fn set_credential(
        self: &Arc<Self>,
        state: &mut ManagerState,
        value: String,
        expires_in_seconds: i64,
        metrics: &Metrics,
    ) {
        let credential = Credential::new(value.clone(), now(), expires_in_seconds);
        state.schedule.refreshing = false;
        state.schedule.delay_ms = renewal_delay_ms(expires_in_seconds, self.safety_margin_seconds);
        state.consecutive_failures = 0;
        state.last_error = None;

        metrics.token_expiry_unix.set(credential.expires_at.timestamp());
        metrics.scheduled_delay_ms.set(gauge_value(state.schedule.delay_ms));
        info!(
            app_id = %self.app_id,
            expires_at = %credential.expires_at,
            next_fetch_ms = state.schedule.delay_ms,
            "access token renewed"
        );

        state.credential = Some(credential);
        self.arm(state);
        self.emit(TokenEvent::Token(value.clone()));
        for waiter in state.waiters.drain(..) {
            // listener may have given up already
            let _ = waiter.send(value.clone());
        }
    }

    /// Schedule the next attempt, then report the failure.
    fn retry(self: &Arc<Self>, state: &mut ManagerState, error: TokenError, metrics: &Metrics) {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.schedule.delay_ms = self.retry.delay_for(state.consecutive_failures);
        state.last_error = Some(error.clone());

        metrics.fetch_failures.with_label_values(&[error.reason()]).inc();
        metrics.scheduled_delay_ms.set(gauge_value(state.schedule.delay_ms));
        warn!(
            app_id = %self.app_id,
            error = %error,
            code = ?error.code(),
            failures = state.consecutive_failures,
            retry_in_ms = state.schedule.delay_ms,
            "access token fetch failed"
        );

        self.arm(state);
        self.emit(TokenEvent::Error(error));
    }

    fn emit(&self, event: TokenEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!(event = name, "no event subscribers");
        }
    }
}
