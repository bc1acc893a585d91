//! Environment configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DB_PRIMARY_URL` | required |
//! | `DB_PRIMARY_KIND` | `postgres` |
//! | `DB_PRIMARY_NAME` | `primary` |
//! | `DB_SECONDARY_URL` | unset: single-store mode |
//! | `DB_SECONDARY_KIND` | `postgres` |
//! | `DB_SECONDARY_NAME` | `secondary` |
//! | `DB_HEALTH_CHECK_INTERVAL_MS` | 30000 |
//! | `DB_FAILURE_THRESHOLD` | 3 |
//! | `DB_RECOVERY_THRESHOLD` | 2 |
//! | `DB_PING_TIMEOUT_MS` | 5000 |
//! | `DB_STICKY_READ_MS` | 5000 |
//! | `DB_SYNC_MAX_RETRIES` | 5 |
//! | `DB_SYNC_RETRY_DELAY_MS` | 5000 |
//! | `DB_SYNC_CLEANUP_AGE_MS` | 3600000 |
//! | `DB_ENABLE_SYNC` | `true` |
//! | `DB_ENABLE_HEALTH_CHECK` | `true` |

use dbrouter_types::{ConfigError, ProviderKind, ProviderRole, ProviderSettings, RouterConfig};
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

use crate::provider::{HttpSqlProvider, PostgresProvider, Provider};

/// Router configuration and provider settings read from the process environment.
pub fn from_env() -> Result<(RouterConfig, Vec<ProviderSettings>), ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`from_env`], reading variables through `lookup`.
pub fn from_lookup<F>(lookup: F) -> Result<(RouterConfig, Vec<ProviderSettings>), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let mut config = RouterConfig::default();
    if let Some(v) = parse(&get, "DB_HEALTH_CHECK_INTERVAL_MS")? {
        config.health.check_interval_ms = v;
    }
    if let Some(v) = parse(&get, "DB_FAILURE_THRESHOLD")? {
        config.health.failure_threshold = v;
    }
    if let Some(v) = parse(&get, "DB_RECOVERY_THRESHOLD")? {
        config.health.recovery_threshold = v;
    }
    if let Some(v) = parse(&get, "DB_PING_TIMEOUT_MS")? {
        config.health.ping_timeout_ms = v;
    }
    if let Some(v) = parse(&get, "DB_STICKY_READ_MS")? {
        config.sticky_read_ms = v;
    }
    if let Some(v) = parse(&get, "DB_SYNC_MAX_RETRIES")? {
        config.replication.max_retries = v;
    }
    if let Some(v) = parse(&get, "DB_SYNC_RETRY_DELAY_MS")? {
        config.replication.retry_delay_ms = v;
    }
    if let Some(v) = parse(&get, "DB_SYNC_CLEANUP_AGE_MS")? {
        config.replication.cleanup_age_ms = v;
    }
    if let Some(v) = get("DB_ENABLE_SYNC") {
        config.enable_sync = parse_bool("DB_ENABLE_SYNC", &v)?;
    }
    if let Some(v) = get("DB_ENABLE_HEALTH_CHECK") {
        config.enable_health_check = parse_bool("DB_ENABLE_HEALTH_CHECK", &v)?;
    }
    config.validate().map_err(|e| ConfigError::from_validation(&e))?;

    let primary_name = get("DB_PRIMARY_NAME").unwrap_or_else(|| "primary".to_string());
    let primary_url = get("DB_PRIMARY_URL").ok_or_else(|| ConfigError::MissingConnection {
        provider: primary_name.clone(),
        variable: "DB_PRIMARY_URL".to_string(),
    })?;

    let mut providers = vec![ProviderSettings {
        name: primary_name,
        kind: parse_kind(&get, "DB_PRIMARY_KIND")?,
        connection: primary_url,
        role: ProviderRole::Master,
        priority: 0,
    }];

    if let Some(secondary_url) = get("DB_SECONDARY_URL") {
        providers.push(ProviderSettings {
            name: get("DB_SECONDARY_NAME").unwrap_or_else(|| "secondary".to_string()),
            kind: parse_kind(&get, "DB_SECONDARY_KIND")?,
            connection: secondary_url,
            role: ProviderRole::Slave,
            priority: 1,
        });
    } else {
        tracing::info!("DB_SECONDARY_URL not set, running with a single store");
    }

    Ok((config, providers))
}

fn parse<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::ValidationError {
                field: key.to_string(),
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ValidationError {
            field: key.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}

fn parse_kind<G>(get: &G, key: &str) -> Result<ProviderKind, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key).map_or(Ok(ProviderKind::default()), |raw| {
        raw.parse::<ProviderKind>()
            .map_err(|message| ConfigError::ValidationError { field: key.to_string(), message })
    })
}

/// Construct the backend for one configured store. No connection is opened.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn Provider>, ConfigError> {
    if settings.connection.trim().is_empty() {
        return Err(ConfigError::MissingConnection {
            provider: settings.name.clone(),
            variable: "connection".to_string(),
        });
    }

    let provider: Arc<dyn Provider> = match settings.kind {
        ProviderKind::Postgres => {
            Arc::new(PostgresProvider::connect_lazy(&settings.name, &settings.connection)?)
        },
        ProviderKind::Http => {
            Arc::new(HttpSqlProvider::from_connection_string(&settings.name, &settings.connection)?)
        },
    };
    Ok(provider)
}
