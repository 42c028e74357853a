use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::chart::{self, ChartConfig};
use crate::db::schema_context::{self, TABLES};
use crate::db::{DbError, QueryExecutor, ResultRow, SqlDialect};
use crate::error::ServiceError;
use crate::llm::LlmManager;

/// Result of one chat pipeline run: either an answer or a failure that still
/// echoes the caller's question.
#[derive(Debug)]
pub enum ChatOutcome {
    Answered(ChatAnswer),
    Failed(ChatFailure),
}

#[derive(Debug)]
pub struct ChatAnswer {
    pub question: String,
    pub sql: String,
    pub rows: Vec<ResultRow>,
    pub chart: Option<ChartConfig>,
    pub explanation: String,
}

#[derive(Debug)]
pub struct ChatFailure {
    pub question: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SchemaInfo {
    pub schema: &'static str,
    pub tables: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub llm_backend: bool,
    pub database: bool,
}

#[derive(Debug)]
pub struct HealthReport {
    pub checks: HealthChecks,
    pub errors: BTreeMap<&'static str, String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.llm_backend && self.checks.database
    }
}

/// Wires schema text, SQL generation, execution and chart hints together.
/// Holds only read-only handles, so one instance serves every request.
pub struct ChatService {
    llm: Arc<LlmManager>,
    executor: Option<Arc<dyn QueryExecutor>>,
    query_timeout: Duration,
}

impl ChatService {
    pub fn new(
        llm: Arc<LlmManager>,
        executor: Option<Arc<dyn QueryExecutor>>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            executor,
            query_timeout,
        }
    }

    pub fn llm_configured(&self) -> bool {
        self.llm.is_configured()
    }

    pub fn database_configured(&self) -> bool {
        self.executor.is_some()
    }

    /// Runs generator, executor and chart hints in order. Only an empty
    /// question is an `Err`; stage failures come back as `ChatOutcome::Failed`.
    pub async fn chat(&self, question: &str) -> Result<ChatOutcome, ServiceError> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::Validation("Question cannot be empty".to_string()));
        }

        info!("Processing question: {}", trimmed);

        let dialect = self
            .executor
            .as_ref()
            .map_or(SqlDialect::default(), |executor| executor.dialect());

        let sql = match self
            .llm
            .generate_sql(trimmed, schema_context::schema_description(), dialect)
            .await
        {
            Ok(sql) => sql,
            Err(e) => return Ok(Self::failed(question, e.into())),
        };
        info!("Generated SQL: {}", sql);

        let rows = match self.execute(&sql).await {
            Ok(rows) => rows,
            Err(e) => return Ok(Self::failed(question, e)),
        };
        info!("Query returned {} rows", rows.len());

        let chart = chart::build_chart_config(trimmed, &rows);
        let explanation = format!(
            "Generated SQL query based on your question about {}. Found {} result(s).",
            trimmed.to_lowercase(),
            rows.len()
        );

        Ok(ChatOutcome::Answered(ChatAnswer {
            question: trimmed.to_string(),
            sql,
            rows,
            chart,
            explanation,
        }))
    }

    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, ServiceError> {
        let executor = self
            .executor
            .as_ref()
            .ok_or_else(|| ServiceError::Configuration("DATABASE_URL not configured".to_string()))?;

        match tokio::time::timeout(self.query_timeout, executor.execute(sql)).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(DbError::Timeout(self.query_timeout.as_secs()).into()),
        }
    }

    /// Any stage failure drops the generated SQL; only the question and the
    /// error message are reported.
    fn failed(question: &str, err: ServiceError) -> ChatOutcome {
        error!("Chat processing error: {}", err);
        ChatOutcome::Failed(ChatFailure {
            question: question.to_string(),
            error: err.to_string(),
        })
    }

    pub fn schema(&self) -> SchemaInfo {
        SchemaInfo {
            schema: schema_context::schema_description(),
            tables: TABLES.to_vec(),
        }
    }

    /// Reports backend availability. The database check acquires and releases
    /// one connection; failures are recorded, never raised.
    pub async fn health(&self) -> HealthReport {
        let mut errors = BTreeMap::new();

        let llm_backend = self.llm.is_configured();
        if !llm_backend {
            errors.insert("llm_backend", "LLM backend not configured".to_string());
        }

        let database = match &self.executor {
            None => {
                errors.insert("database", "DATABASE_URL not configured".to_string());
                false
            }
            Some(executor) => match tokio::time::timeout(self.query_timeout, executor.ping()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    errors.insert("database", e.to_string());
                    false
                }
                Err(_) => {
                    errors.insert("database", DbError::Timeout(self.query_timeout.as_secs()).to_string());
                    false
                }
            },
        };

        HealthReport {
            checks: HealthChecks {
                llm_backend,
                database,
            },
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartType;
    use crate::db::testing::{row, FakeExecutor};
    use crate::llm::testing::{settings, ScriptedProvider};
    use async_trait::async_trait;
    use serde_json::json;

    const TOP_VENDORS_SQL: &str = "SELECT v.name, SUM(i.total_amount) AS total_spend FROM vendors v JOIN invoices i ON v.id = i.vendor_id WHERE i.status = 'PAID' GROUP BY v.id, v.name ORDER BY total_spend DESC LIMIT 5";

    fn service(provider: ScriptedProvider, executor: Option<Arc<FakeExecutor>>) -> ChatService {
        let llm = LlmManager::with_provider(Box::new(provider), settings());
        ChatService::new(
            Arc::new(llm),
            executor.map(|e| e as Arc<dyn QueryExecutor>),
            Duration::from_secs(5),
        )
    }

    fn vendor_rows() -> Vec<ResultRow> {
        ["Acme", "Globex", "Initech", "Umbrella", "Hooli"]
            .iter()
            .zip([500.0, 400.0, 300.0, 200.0, 100.0])
            .map(|(name, spend)| row(&[("name", json!(name)), ("total_spend", json!(spend))]))
            .collect()
    }

    #[tokio::test]
    async fn top_vendors_end_to_end() {
        let provider = Arc::new(ScriptedProvider::replying(&format!("```sql\n{TOP_VENDORS_SQL}\n```")));
        let executor = Arc::new(FakeExecutor::returning(vendor_rows()));
        let llm = LlmManager::with_provider(Box::new(Arc::clone(&provider)), settings());
        let service = ChatService::new(
            Arc::new(llm),
            Some(Arc::clone(&executor) as Arc<dyn QueryExecutor>),
            Duration::from_secs(5),
        );

        let outcome = service.chat("top 5 vendors by total spend").await.unwrap();
        let ChatOutcome::Answered(answer) = outcome else {
            panic!("expected an answer");
        };

        assert_eq!(answer.sql, TOP_VENDORS_SQL);
        assert_eq!(answer.rows.len(), 5);
        let chart = answer.chart.unwrap();
        assert_eq!(chart.chart_type, ChartType::Bar);
        assert_eq!(chart.x_axis.as_deref(), Some("name"));
        assert_eq!(chart.y_axis.as_deref(), Some("total_spend"));
        assert!(answer.explanation.ends_with("Found 5 result(s)."));

        // The generator saw the schema-grounded prompt and the raw question
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].user, "top 5 vendors by total spend");
        assert!(requests[0].system.contains(schema_context::schema_description()));

        assert_eq!(*executor.statements.lock().unwrap(), vec![TOP_VENDORS_SQL.to_string()]);
    }

    #[tokio::test]
    async fn blank_questions_never_reach_the_generator() {
        let provider = Arc::new(ScriptedProvider::replying("SELECT 1"));
        let llm = LlmManager::with_provider(Box::new(Arc::clone(&provider)), settings());
        let service = ChatService::new(Arc::new(llm), None, Duration::from_secs(5));

        for question in ["", "   "] {
            let err = service.chat(question).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn database_failure_reports_question_without_sql() {
        let executor = Arc::new(FakeExecutor::failing("relation \"vendor\" does not exist"));
        let service = service(ScriptedProvider::replying("SELECT * FROM vendor"), Some(executor));

        let question = "  show all vendors ";
        let ChatOutcome::Failed(failure) = service.chat(question).await.unwrap() else {
            panic!("expected a failure");
        };

        assert_eq!(failure.question, question);
        assert!(!format!("{failure:?}").contains("SELECT * FROM vendor"));
        assert_eq!(
            failure.error,
            "SQL execution failed: relation \"vendor\" does not exist"
        );
    }

    #[tokio::test]
    async fn generation_failure_never_reaches_the_database() {
        let executor = Arc::new(FakeExecutor::returning(vec![]));
        let service = service(ScriptedProvider::failing("rate limited"), Some(Arc::clone(&executor)));

        let ChatOutcome::Failed(failure) = service.chat("top vendors").await.unwrap() else {
            panic!("expected a failure");
        };

        assert_eq!(failure.question, "top vendors");
        assert!(failure.error.starts_with("Failed to generate SQL:"));
        assert!(executor.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_follows_the_executor_dialect() {
        let provider = Arc::new(ScriptedProvider::replying("SELECT 1"));
        let executor = FakeExecutor::returning(vec![]).speaking(SqlDialect::DuckDb);
        let llm = LlmManager::with_provider(Box::new(Arc::clone(&provider)), settings());
        let service = ChatService::new(Arc::new(llm), Some(Arc::new(executor)), Duration::from_secs(5));

        service.chat("count invoices").await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].system.contains("Generate ONLY valid DuckDB SQL"));
        assert!(!requests[0].system.contains("PostgreSQL"));
    }

    #[tokio::test]
    async fn prompt_defaults_to_postgres_without_a_database() {
        let provider = Arc::new(ScriptedProvider::replying("SELECT 1"));
        let llm = LlmManager::with_provider(Box::new(Arc::clone(&provider)), settings());
        let service = ChatService::new(Arc::new(llm), None, Duration::from_secs(5));

        service.chat("count invoices").await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].system.contains("Generate ONLY valid PostgreSQL SQL"));
    }

    #[tokio::test]
    async fn missing_database_is_reported_in_the_error() {
        let service = service(ScriptedProvider::replying("SELECT 1"), None);

        let ChatOutcome::Failed(failure) = service.chat("count invoices").await.unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.error, "DATABASE_URL not configured");
    }

    #[tokio::test]
    async fn empty_result_has_no_chart() {
        let executor = Arc::new(FakeExecutor::returning(vec![]));
        let service = service(ScriptedProvider::replying("SELECT 1 WHERE false"), Some(executor));

        let ChatOutcome::Answered(answer) = service.chat("Overdue invoices").await.unwrap() else {
            panic!("expected an answer");
        };
        assert!(answer.chart.is_none());
        assert_eq!(
            answer.explanation,
            "Generated SQL query based on your question about overdue invoices. Found 0 result(s)."
        );
    }

    struct StalledExecutor;

    #[async_trait]
    impl QueryExecutor for StalledExecutor {
        fn backend(&self) -> &'static str {
            "stalled"
        }

        fn dialect(&self) -> SqlDialect {
            SqlDialect::Postgres
        }

        async fn execute(&self, _sql: &str) -> Result<Vec<ResultRow>, DbError> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<(), DbError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn hung_query_times_out() {
        let llm = LlmManager::with_provider(Box::new(ScriptedProvider::replying("SELECT 1")), settings());
        let service = ChatService::new(
            Arc::new(llm),
            Some(Arc::new(StalledExecutor)),
            Duration::from_millis(50),
        );

        let ChatOutcome::Failed(failure) = service.chat("count invoices").await.unwrap() else {
            panic!("expected a failure");
        };
        assert!(failure.error.contains("timed out"));

        let report = service.health().await;
        assert!(!report.checks.database);
        assert!(report.errors["database"].contains("timed out"));
    }

    #[tokio::test]
    async fn health_reports_each_backend() {
        let healthy = service(
            ScriptedProvider::replying("SELECT 1"),
            Some(Arc::new(FakeExecutor::returning(vec![]))),
        );
        let report = healthy.health().await;
        assert!(report.is_healthy());
        assert!(report.errors.is_empty());

        let unconfigured = ChatService::new(
            Arc::new(LlmManager::unconfigured(settings())),
            Some(Arc::new(FakeExecutor::failing("boom"))),
            Duration::from_secs(5),
        );
        let report = unconfigured.health().await;
        assert!(!report.checks.llm_backend);
        assert!(!report.checks.database);
        assert_eq!(report.errors["database"], "Database connection failed: connection refused");
    }

    #[test]
    fn schema_lists_the_five_tables() {
        let service = service(ScriptedProvider::replying(""), None);
        let schema = service.schema();
        assert_eq!(
            schema.tables,
            vec!["vendors", "customers", "invoices", "line_items", "payments"]
        );
        assert_eq!(schema.schema, schema_context::schema_description());
    }
}
