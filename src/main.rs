use std::process::ExitCode;

use reviewer_assign::config::Config;
use reviewer_assign::services::start_server;
use reviewer_assign::{build_selector, build_state, build_store};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("[app] Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = match build_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("[app] Failed to open store: {:?}", e);
            return ExitCode::FAILURE;
        }
    };

    let state = build_state(store, build_selector(&config), &config);
    let cancel_token = CancellationToken::new();

    let server = match start_server(config.http_addr, state, cancel_token.clone()).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("[app] Failed to bind {}: {}", config.http_addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[app] Failed to listen for shutdown signal: {}", e);
    }

    server.shutdown().await;
    ExitCode::SUCCESS
}
