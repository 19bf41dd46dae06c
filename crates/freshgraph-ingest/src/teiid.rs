//! Teiid data warehouse client.
//!
//! Teiid speaks the PostgreSQL wire protocol (ODBC port, 35432 by default),
//! so the client is a small sqlx Postgres pool.

use crate::error::{IngestError, Result};
use crate::task::{QueryService, Row};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, Row as _, ValueRef};

#[derive(Debug, Clone)]
pub struct TeiidConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl TeiidConfig {
    pub const DEFAULT_PORT: u16 = 35432;
}

pub struct TeiidClient {
    pool: PgPool,
}

impl TeiidClient {
    /// Open a lazily-connecting pool; the first query establishes the session.
    pub fn connect_lazy(config: &TeiidConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(PgSslMode::Prefer);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);
        tracing::debug!(host = %config.host, port = config.port, database = %config.database, "configured teiid pool");
        Self { pool }
    }
}

fn decode(row: &PgRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }
    if let Ok(s) = row.try_get::<String, _>(index) {
        return Value::from(s);
    }
    if let Ok(i) = row.try_get::<i64, _>(index) {
        return Value::from(i);
    }
    if let Ok(i) = row.try_get::<i32, _>(index) {
        return Value::from(i);
    }
    if let Ok(f) = row.try_get::<f64, _>(index) {
        return Value::from(f);
    }
    if let Ok(b) = row.try_get::<bool, _>(index) {
        return Value::from(b);
    }
    Value::Null
}

#[async_trait]
impl QueryService for TeiidClient {
    async fn query(&self, sql: &str, params: &[i64]) -> Result<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| IngestError::Query(err.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|column| (column.name().to_string(), decode(row, column.ordinal())))
                    .collect()
            })
            .collect())
    }
}
