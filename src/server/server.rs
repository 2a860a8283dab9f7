use std::future::Future;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::manager::TokenManager;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::sinks::sink_http::SinkHttpState;
use crate::sources::Fetcher;

pub struct AppState<F: Fetcher> {
    pub metrics_state: MetricsState,
    pub sink_http_state: SinkHttpState<F>,
}

impl<F: Fetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            metrics_state: self.metrics_state.clone(),
            sink_http_state: self.sink_http_state.clone(),
        }
    }
}

impl<F: Fetcher> AppState<F> {
    pub fn new(metrics: &Metrics, settings_config: &SettingsConfig, manager: TokenManager<F>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            sink_http_state: SinkHttpState::new(manager, settings_config.server.refresh_timeout_ms),
        }
    }
}

/// Metrics route (when enabled) merged with the token routes.
pub async fn router<F: Fetcher>(settings_config: &SettingsConfig, manager: TokenManager<F>) -> Router {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, settings_config, manager);

    Router::new()
        .merge(state.metrics_state.router::<F>(&settings_config.metrics))
        .merge(state.sink_http_state.router())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn start<F, S>(
    settings_config: &SettingsConfig,
    manager: TokenManager<F>,
    shutdown: S,
) -> Result<()>
where
    F: Fetcher,
    S: Future<Output = ()> + Send + 'static,
{
    let app = router(settings_config, manager).await;

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    let metrics = get_metrics().await;
    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server failed")?;
    metrics.up.set(0);

    Ok(())
}
