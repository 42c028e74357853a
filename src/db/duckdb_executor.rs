use crate::config::DatabaseConfig;
use crate::db::db_pool::DuckDBConnectionManager;
use crate::db::{is_select, success_row, DbError, QueryExecutor, ResultRow, SqlDialect};
use arrow::json::writer::{JsonArray, WriterBuilder};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use r2d2::Pool;
use std::time::Duration;
use tracing::debug;

/// Embedded DuckDB backend. Calls run on the blocking pool, one pooled
/// connection per statement.
pub struct DuckDbExecutor {
    pool: Pool<DuckDBConnectionManager>,
}

impl DuckDbExecutor {
    pub fn new(path: &str, config: &DatabaseConfig) -> Result<Self, DbError> {
        let manager = DuckDBConnectionManager::new(path.to_string());
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .min_idle(Some(0))
            .connection_timeout(Duration::from_secs(config.connect_timeout_secs.max(1)))
            .build_unchecked(manager);

        Ok(Self { pool })
    }

    fn run(pool: &Pool<DuckDBConnectionManager>, sql: &str) -> Result<Vec<ResultRow>, DbError> {
        // Returned to the pool on every exit path when it drops
        let conn = pool.get().map_err(|e| DbError::Connection(e.to_string()))?;

        if !is_select(sql) {
            let affected = conn.execute(sql, []).map_err(|e| DbError::Query(e.to_string()))?;
            debug!("Statement affected {} row(s)", affected);
            return Ok(vec![success_row()]);
        }

        let mut stmt = conn.prepare(sql).map_err(|e| DbError::Query(e.to_string()))?;
        let batches: Vec<RecordBatch> = stmt
            .query_arrow([])
            .map_err(|e| DbError::Query(e.to_string()))?
            .collect();

        batches_to_rows(&batches)
    }
}

/// Converts Arrow batches into ordered JSON rows, keeping explicit nulls.
fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<ResultRow>, DbError> {
    let row_count: usize = batches.iter().map(RecordBatch::num_rows).sum();
    if row_count == 0 {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer
        .write_batches(&refs)
        .map_err(|e| DbError::Query(format!("Failed to convert result rows: {}", e)))?;
    writer
        .finish()
        .map_err(|e| DbError::Query(format!("Failed to convert result rows: {}", e)))?;

    serde_json::from_slice(&writer.into_inner())
        .map_err(|e| DbError::Query(format!("Failed to convert result rows: {}", e)))
}

#[async_trait]
impl QueryExecutor for DuckDbExecutor {
    fn backend(&self) -> &'static str {
        "duckdb"
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::DuckDb
    }

    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, DbError> {
        let pool = self.pool.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || Self::run(&pool, &sql))
            .await
            .map_err(|e| DbError::Task(e.to_string()))?
    }

    async fn ping(&self) -> Result<(), DbError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            pool.get()
                .map(drop)
                .map_err(|e| DbError::Connection(e.to_string()))
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
    }
}
