use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::db::ResultRow;
use crate::error::ServiceError;
use crate::service::{ChatOutcome, HealthChecks, SchemaInfo};
use crate::web::state::AppState;

const SERVICE_NAME: &str = "NL Analytics Server";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Wire shape of a chat answer. Every key is always present; a failed run
/// carries `error` and leaves the data fields null.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub question: String,
    pub sql: Option<String>,
    pub data: Option<Vec<ResultRow>>,
    pub chart_config: Option<Value>,
    pub error: Option<String>,
    pub explanation: Option<String>,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        match outcome {
            ChatOutcome::Answered(answer) => {
                let chart_config = answer
                    .chart
                    .and_then(|chart| serde_json::to_value(chart).ok())
                    .unwrap_or_else(|| Value::Object(Map::new()));

                Self {
                    question: answer.question,
                    sql: Some(answer.sql),
                    data: Some(answer.rows),
                    chart_config: Some(chart_config),
                    error: None,
                    explanation: Some(answer.explanation),
                }
            }
            ChatOutcome::Failed(failure) => Self {
                question: failure.question,
                sql: None,
                data: None,
                chart_config: None,
                error: Some(failure.error),
                explanation: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: i64,
    pub llm_configured: bool,
    pub database_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub timestamp: String,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<&'static str, String>>,
}

// Service identity
pub async fn root(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    let now = chrono::Utc::now();

    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        timestamp: now.to_rfc3339(),
        uptime_seconds: now.signed_duration_since(state.startup_time).num_seconds(),
        llm_configured: state.service.llm_configured(),
        database_configured: state.service.database_configured(),
    })
}

// Natural language question to SQL, rows and a chart hint
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServiceError> {
    if !payload.context.is_empty() {
        debug!("Ignoring chat context keys: {:?}", payload.context.keys().collect::<Vec<_>>());
    }

    let outcome = state.service.chat(&payload.question).await?;
    Ok(Json(ChatResponse::from(outcome)))
}

// Schema
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<SchemaInfo> {
    Json(state.service.schema())
}

// Detailed health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let report = state.service.health().await;
    let status = if report.is_healthy() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        service: SERVICE_NAME,
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: report.checks,
        errors: (!report.errors.is_empty()).then_some(report.errors),
    })
}
