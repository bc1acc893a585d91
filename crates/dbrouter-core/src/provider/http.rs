//! SQL-over-HTTP provider for serverless PostgreSQL edge endpoints.
//!
//! Each statement is one `POST {endpoint}` carrying
//! `{"query": "...", "params": [...]}`; the connection string travels in the
//! `Neon-Connection-String` header and the response is
//! `{"rows": [{...}], "rowCount": n}`. No connection is held between calls,
//! which is what makes this backend cheap to ping from edge runtimes.

use async_trait::async_trait;
use dbrouter_types::{ConfigError, ProviderError, QueryResult, Row, SqlParam};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use super::Provider;

const CONNECTION_STRING_HEADER: &str = "Neon-Connection-String";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SqlResponse {
    #[serde(default)]
    rows: Vec<Row>,
    row_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SqlErrorResponse {
    message: String,
}

pub struct HttpSqlProvider {
    name: String,
    endpoint: Url,
    connection_string: String,
    client: Client,
    closed: AtomicBool,
}

impl HttpSqlProvider {
    /// Derive the endpoint (`https://{host}/sql`) from a `postgres://` URL.
    pub fn from_connection_string(
        name: impl Into<String>,
        connection_string: &str,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let invalid = |message: String| ConfigError::InvalidConnection {
            provider: name.clone(),
            message,
        };

        let parsed = Url::parse(connection_string.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        let host = parsed.host_str().ok_or_else(|| invalid("missing host".to_string()))?;
        let endpoint =
            Url::parse(&format!("https://{host}/sql")).map_err(|e| invalid(e.to_string()))?;

        Self::with_endpoint(name.clone(), endpoint, connection_string.trim())
    }

    /// Use an explicit endpoint URL.
    pub fn with_endpoint(
        name: impl Into<String>,
        endpoint: Url,
        connection_string: &str,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::InvalidConnection {
                provider: name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name,
            endpoint,
            connection_string: connection_string.to_string(),
            client,
            closed: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn connection_error(&self, err: &reqwest::Error) -> ProviderError {
        ProviderError::Connection { provider: self.name.clone(), message: err.to_string() }
    }
}

/// Structured values travel as JSON text; scalars as-is.
fn encode_param(param: &SqlParam) -> Value {
    match param {
        Value::Array(_) | Value::Object(_) => Value::String(param.to_string()),
        other => other.clone(),
    }
}

fn truncate_body(s: &str) -> String {
    if s.chars().count() <= MAX_ERROR_BODY_CHARS {
        s.to_string()
    } else {
        let mut result: String = s.chars().take(MAX_ERROR_BODY_CHARS).collect();
        result.push('…');
        result
    }
}

#[async_trait]
impl Provider for HttpSqlProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> &'static str {
        "http"
    }

    async fn run(&self, sql: &str, params: &[SqlParam]) -> Result<QueryResult, ProviderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Disconnected { provider: self.name.clone() });
        }

        let body = json!({
            "query": sql,
            "params": params.iter().map(encode_param).collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONNECTION_STRING_HEADER, &self.connection_string)
            .header("Neon-Raw-Text-Output", "false")
            .header("Neon-Array-Mode", "false")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.connection_error(&e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.connection_error(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<SqlErrorResponse>(&text)
                .map(|e| e.message)
                .unwrap_or_else(|_| truncate_body(&text));
            return Err(if status.is_server_error() {
                ProviderError::Connection {
                    provider: self.name.clone(),
                    message: format!("HTTP {status}: {message}"),
                }
            } else {
                ProviderError::Query { provider: self.name.clone(), message }
            });
        }

        let parsed: SqlResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderError::Decode { provider: self.name.clone(), message: e.to_string() }
        })?;

        let row_count = parsed.row_count.unwrap_or(parsed.rows.len() as u64);
        Ok(QueryResult::new(parsed.rows, row_count))
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!(provider = %self.name, "HTTP SQL provider closed");
    }
}
