use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod chart;
mod config;
mod db;
mod error;
mod llm;
mod service;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::llm::LlmManager;
use crate::service::ChatService;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;

    // Missing database config is reported by / and /health, not fatal
    let executor = db::connect(&config.database)?;
    match &executor {
        Some(executor) => info!("Query executor ready ({})", executor.backend()),
        None => warn!("DATABASE_URL not configured, queries will fail until it is set"),
    }

    let service = ChatService::new(
        Arc::new(llm_manager),
        executor,
        Duration::from_secs(config.database.query_timeout_secs),
    );
    let app_state = Arc::new(AppState::new(config.clone(), service));

    // Start the web server
    info!("Starting NL Analytics server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
