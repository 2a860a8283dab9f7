use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use wechat_token::config::loader;
use wechat_token::server;
use wechat_token::utils::logging;
use wechat_token::utils::logging::LogLevel;
use wechat_token::{TokenEvent, TokenManager};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "wechat-token.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let service_config = loader::file_to_config(Path::new(&args.config)).await?;
    logging::run(&service_config.settings, args.log_level);

    // -------------------------------
    // 2. Create token manager
    // -------------------------------

    let manager = TokenManager::from_config(&service_config.manager)?;

    // -------------------------------
    // 3. Log lifecycle events
    // -------------------------------

    let mut events = manager.subscribe();
    let event_logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TokenEvent::Token(_)) => info!("access token renewed"),
                Ok(TokenEvent::Error(e)) => warn!(
                    name = e.name(),
                    code = e.code(),
                    "token fetch failed: {}",
                    e
                ),
                Ok(event) => info!("token manager {}", event.name()),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // -------------------------------
    // 4. Start renewal and serve the token
    // -------------------------------

    manager.start().await;
    info!("Service starting...");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {}", e);
        }
    };
    let served = server::server::start(&service_config.settings, manager.clone(), shutdown).await;

    // -------------------------------
    // 5. Shut down
    // -------------------------------

    manager.stop().await;
    drop(manager);
    let _ = event_logger.await;
    info!("Service stopped");

    served
}
