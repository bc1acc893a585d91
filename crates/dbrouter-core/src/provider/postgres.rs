//! Pooled PostgreSQL provider.

use async_trait::async_trait;
use dbrouter_types::{ConfigError, ProviderError, QueryResult, SqlParam};
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Either, Executor, Statement};
use std::str::FromStr;
use std::time::Duration;

use super::postgres_codec::{bind_params, row_to_json};
use super::Provider;

/// Provider backed by a `sqlx` connection pool.
pub struct PostgresProvider {
    name: String,
    pool: PgPool,
}

impl PostgresProvider {
    /// Create provider with existing pool.
    pub fn new(name: impl Into<String>, pool: PgPool) -> Self {
        Self { name: name.into(), pool }
    }

    /// Build a lazily-connecting pool; no connection is opened until first use.
    pub fn connect_lazy(name: impl Into<String>, database_url: &str) -> Result<Self, ConfigError> {
        let name = name.into();
        let options = PgConnectOptions::from_str(database_url.trim()).map_err(|err| {
            ConfigError::InvalidConnection { provider: name.clone(), message: err.to_string() }
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .connect_lazy_with(options);

        Ok(Self::new(name, pool))
    }

    /// Get reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_sqlx_err(&self, err: sqlx::Error) -> ProviderError {
        let provider = self.name.clone();
        let message = err.to_string();
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Protocol(_) => ProviderError::Connection { provider, message },
            sqlx::Error::PoolClosed => ProviderError::Disconnected { provider },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                ProviderError::Decode { provider, message }
            },
            _ => ProviderError::Query { provider, message },
        }
    }
}

#[async_trait]
impl Provider for PostgresProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn run(&self, sql: &str, params: &[SqlParam]) -> Result<QueryResult, ProviderError> {
        let mut conn = self.pool.acquire().await.map_err(|err| self.map_sqlx_err(err))?;

        // Prepare first so the server infers each placeholder's type; the
        // statement is cached on the connection and reused by the query below.
        let query = if params.is_empty() {
            sqlx::query(sql)
        } else {
            let statement =
                (&mut *conn).prepare(sql).await.map_err(|err| self.map_sqlx_err(err))?;
            let types = match statement.parameters() {
                Some(Either::Left(types)) => types.to_vec(),
                _ => Vec::new(),
            };
            bind_params(sqlx::query(sql), params, &types, &self.name)?
        };

        let mut rows = Vec::new();
        let mut rows_affected: u64 = 0;
        let mut stream = (&mut *conn).fetch_many(query);
        while let Some(step) = stream.try_next().await.map_err(|err| self.map_sqlx_err(err))? {
            match step {
                Either::Left(done) => rows_affected += done.rows_affected(),
                Either::Right(row) => rows.push(row_to_json(&row, &self.name)?),
            }
        }

        let row_count = rows_affected.max(rows.len() as u64);
        Ok(QueryResult::new(rows, row_count))
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        sqlx::query(super::PING_SQL)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| self.map_sqlx_err(err))
    }

    async fn disconnect(&self) {
        self.pool.close().await;
        tracing::info!(provider = %self.name, "PostgreSQL pool closed");
    }
}
