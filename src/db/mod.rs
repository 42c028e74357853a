pub mod db_pool;
pub mod duckdb_executor;
pub mod postgres;
pub mod schema_context;

use crate::config::DatabaseConfig;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// One result row: column name to scalar value, in the order the database
/// returned the columns.
pub type ResultRow = Map<String, Value>;

pub const SUCCESS_MESSAGE: &str = "Query executed successfully";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{0}")]
    Config(String),
    #[error("Database connection failed: {0}")]
    Connection(String),
    #[error("{0}")]
    Query(String),
    #[error("query timed out after {0}s")]
    Timeout(u64),
    #[error("database task failed: {0}")]
    Task(String),
}

/// The SQL flavour an executor speaks; the prompt asks the model for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    Postgres,
    DuckDb,
}

impl SqlDialect {
    pub fn name(self) -> &'static str {
        match self {
            SqlDialect::Postgres => "PostgreSQL",
            SqlDialect::DuckDb => "DuckDB",
        }
    }
}

/// Runs generated SQL verbatim against one relational backend.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn backend(&self) -> &'static str;

    fn dialect(&self) -> SqlDialect;

    /// Executes a single statement. SELECTs return their rows, anything else
    /// is committed and acknowledged with one `{"message": ...}` row.
    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, DbError>;

    /// Acquires a connection and releases it straight away.
    async fn ping(&self) -> Result<(), DbError>;
}

/// Statement-type sniffing: only text starting with SELECT (after trimming,
/// any case) is fetched as rows.
pub fn is_select(sql: &str) -> bool {
    sql.trim().to_uppercase().starts_with("SELECT")
}

pub fn success_row() -> ResultRow {
    let mut row = Map::new();
    row.insert("message".to_string(), Value::String(SUCCESS_MESSAGE.to_string()));
    row
}

#[derive(Debug, PartialEq)]
enum Backend {
    Postgres(String),
    DuckDb(String),
}

/// Postgres URLs (including the `postgresql+psycopg` driver form),
/// `duckdb://<path>` and bare file paths are accepted. Any other
/// `scheme://` is a configuration error.
fn classify_url(url: &str) -> Result<Backend, DbError> {
    let url = url.trim();
    let Some((scheme, rest)) = url.split_once("://") else {
        return Ok(Backend::DuckDb(url.to_string()));
    };

    match scheme.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(Backend::Postgres(url.to_string())),
        "postgresql+psycopg" => Ok(Backend::Postgres(format!("postgresql://{rest}"))),
        "duckdb" => Ok(Backend::DuckDb(rest.to_string())),
        _ => Err(DbError::Config(format!(
            "Unsupported DATABASE_URL scheme: {scheme}"
        ))),
    }
}

/// Builds the executor for `config.url`, or `None` when no database is
/// configured. Connections are opened lazily, so an unreachable server is
/// reported by `ping` rather than here.
pub fn connect(config: &DatabaseConfig) -> Result<Option<Arc<dyn QueryExecutor>>, DbError> {
    let Some(url) = config.url.as_deref() else {
        return Ok(None);
    };

    let executor: Arc<dyn QueryExecutor> = match classify_url(url)? {
        Backend::Postgres(url) => {
            info!("Using PostgreSQL query executor");
            Arc::new(postgres::PostgresExecutor::new(&url, config)?)
        }
        Backend::DuckDb(path) => {
            info!("Using DuckDB query executor at {}", path);
            Arc::new(duckdb_executor::DuckDbExecutor::new(&path, config)?)
        }
    };

    Ok(Some(executor))
}
