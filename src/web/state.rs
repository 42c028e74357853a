use crate::config::AppConfig;
use crate::service::ChatService;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub service: ChatService,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, service: ChatService) -> Self {
        Self {
            config,
            service,
            startup_time: chrono::Utc::now(),
        }
    }
}
