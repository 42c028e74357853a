use crate::config::DatabaseConfig;
use crate::db::{is_select, success_row, DbError, QueryExecutor, ResultRow, SqlDialect};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};
use sqlx::postgres::{PgColumn, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, warn};

pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    pub fn new(url: &str, config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size.max(1))
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs.max(1)))
            .connect_lazy(url)
            .map_err(|e| DbError::Config(format!("Invalid DATABASE_URL: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, DbError> {
        // Released back to the pool when dropped, on success or error
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        if is_select(sql) {
            let rows = sqlx::query(sql)
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| DbError::Query(e.to_string()))?;

            Ok(rows.iter().map(convert_row).collect())
        } else {
            let result = sqlx::query(sql)
                .execute(&mut *conn)
                .await
                .map_err(|e| DbError::Query(e.to_string()))?;
            debug!("Statement affected {} row(s)", result.rows_affected());

            Ok(vec![success_row()])
        }
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.pool
            .acquire()
            .await
            .map(drop)
            .map_err(|e| DbError::Connection(e.to_string()))
    }
}

fn convert_row(row: &PgRow) -> ResultRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| (column.name().to_string(), convert_cell(row, column, index)))
        .collect()
}

fn convert_cell(row: &PgRow, column: &PgColumn, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => Value::Null,
        Ok(_) => decode_cell_value(row, column, index),
        Err(e) => {
            warn!("Failed to read column {}: {}", column.name(), e);
            Value::Null
        }
    }
}

fn decode_cell_value(row: &PgRow, column: &PgColumn, index: usize) -> Value {
    let type_name = column.type_info().name();
    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| float(v as f64)),
        "FLOAT8" => row.try_get::<f64, _>(index).map(float),
        "NUMERIC" => row.try_get::<rust_decimal::Decimal, _>(index).map(|v| {
            v.to_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(v.to_string()))
        }),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .map(|v| Value::String(v.to_rfc3339())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(index)
            .map(|v| Value::String(v.to_string())),
        // Text types and user-defined enums both arrive as their label text
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    decoded.unwrap_or_else(|e| {
        warn!("Unsupported value in column {} ({}): {}", column.name(), type_name, e);
        Value::Null
    })
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
