//! JSON parameters in, JSON rows out, for the PostgreSQL provider.
//!
//! Parameters are bound as the type the server inferred for each placeholder
//! when the statement was prepared, so `WHERE id = $1` against a `uuid`
//! column takes a JSON string and `NULL` fits any column. Placeholder types
//! without a JSON mapping (e.g. `NUMERIC`) need a cast in SQL (`$1::text`).
//!
//! Columns are decoded by PostgreSQL type name. Types without a mapping are
//! read as text; anything that cannot be read as text (e.g. `NUMERIC`) is a
//! decode error and should be cast in SQL (`price::text`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use dbrouter_types::{ProviderError, Row, SqlParam};
use serde_json::{json, Value};
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column, Postgres, Row as _, Type, TypeInfo, ValueRef};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// A JSON value encoded as the placeholder type the server inferred.
#[derive(Debug, Clone)]
pub(crate) struct InferredParam {
    value: Value,
    ty: PgTypeInfo,
}

impl InferredParam {
    pub(crate) fn new(value: Value, ty: PgTypeInfo) -> Self {
        Self { value, ty }
    }
}

impl Type<Postgres> for InferredParam {
    /// Unspecified; the real type always comes from `produces`.
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for InferredParam {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        encode_as(&self.value, &self.ty, buf)
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.ty.clone())
    }
}

/// Bind positional parameters against the placeholder types of the prepared
/// statement.
pub(crate) fn bind_params<'q>(
    mut query: PgQuery<'q>,
    params: &[SqlParam],
    types: &[PgTypeInfo],
    provider: &str,
) -> Result<PgQuery<'q>, ProviderError> {
    if params.len() != types.len() {
        return Err(ProviderError::Query {
            provider: provider.to_string(),
            message: format!("statement expects {} parameter(s), got {}", types.len(), params.len()),
        });
    }
    for (param, ty) in params.iter().zip(types) {
        query = query.bind(InferredParam::new(param.clone(), ty.clone()));
    }
    Ok(query)
}

fn put<'q, T: Encode<'q, Postgres>>(
    value: T,
    buf: &mut PgArgumentBuffer,
) -> Result<IsNull, BoxDynError> {
    value.encode_by_ref(buf)
}

fn encode_as(
    value: &Value,
    ty: &PgTypeInfo,
    buf: &mut PgArgumentBuffer,
) -> Result<IsNull, BoxDynError> {
    if value.is_null() {
        return Ok(IsNull::Yes);
    }

    match ty.name() {
        "BOOL" => put(as_bool(value)?, buf),
        "INT2" => put(i16::try_from(as_i64(value)?)?, buf),
        "INT4" => put(i32::try_from(as_i64(value)?)?, buf),
        "INT8" => put(as_i64(value)?, buf),
        "FLOAT4" => put(as_f64(value)? as f32, buf),
        "FLOAT8" => put(as_f64(value)?, buf),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "UNKNOWN" => put(as_text(value), buf),
        "UUID" => put(uuid::Uuid::parse_str(as_str(value)?)?, buf),
        "TIMESTAMPTZ" => put(parse_timestamptz(as_str(value)?)?, buf),
        "TIMESTAMP" => put(parse_timestamp(as_str(value)?)?, buf),
        "DATE" => put(as_str(value)?.parse::<NaiveDate>()?, buf),
        "JSON" | "JSONB" => put(Json(value), buf),
        "TEXT[]" => put(array_of(value, |v| Ok(as_text(v)))?, buf),
        "INT4[]" => put(array_of(value, |v| Ok(i32::try_from(as_i64(v)?)?))?, buf),
        "INT8[]" => put(array_of(value, as_i64)?, buf),
        "UUID[]" => put(array_of(value, |v| Ok(uuid::Uuid::parse_str(as_str(v)?)?))?, buf),
        name => match ty.kind() {
            PgTypeKind::Domain(base) => encode_as(value, base, buf),
            // Enum labels travel as their text
            PgTypeKind::Enum(_) => put(as_text(value), buf),
            _ => Err(format!(
                "no JSON mapping for parameter type {name}; cast the placeholder (e.g. $1::text)"
            )
            .into()),
        },
    }
}

fn as_bool(value: &Value) -> Result<bool, BoxDynError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => Ok(s.parse::<bool>()?),
        other => Err(format!("expected a boolean, got {other}").into()),
    }
}

fn as_i64(value: &Value) -> Result<i64, BoxDynError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| format!("expected an integer, got {n}").into()),
        Value::String(s) => Ok(s.trim().parse::<i64>()?),
        other => Err(format!("expected an integer, got {other}").into()),
    }
}

fn as_f64(value: &Value) -> Result<f64, BoxDynError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("expected a number, got {n}").into()),
        Value::String(s) => Ok(s.trim().parse::<f64>()?),
        other => Err(format!("expected a number, got {other}").into()),
    }
}

fn as_str(value: &Value) -> Result<&str, BoxDynError> {
    value.as_str().ok_or_else(|| format!("expected a string, got {value}").into())
}

/// Strings as-is; other scalars in their JSON spelling.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn array_of<T, F>(value: &Value, item: F) -> Result<Vec<T>, BoxDynError>
where
    F: Fn(&Value) -> Result<T, BoxDynError>,
{
    value
        .as_array()
        .ok_or_else(|| BoxDynError::from(format!("expected an array, got {value}")))?
        .iter()
        .map(item)
        .collect()
}

/// RFC 3339, PostgreSQL's own output format, or a naive timestamp taken as UTC.
fn parse_timestamptz(raw: &str) -> Result<DateTime<Utc>, BoxDynError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(ts.with_timezone(&Utc));
    }
    Ok(parse_timestamp(raw)?.and_utc())
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, BoxDynError> {
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ts);
    }
    Ok(DateTime::parse_from_rfc3339(raw)?.naive_utc())
}

/// Convert one result row into a column-name keyed JSON object.
pub(crate) fn row_to_json(row: &PgRow, provider: &str) -> Result<Row, ProviderError> {
    let mut out = Row::new();
    for column in row.columns() {
        let value =
            decode_column(row, column.ordinal(), column.type_info().name()).map_err(|err| {
                ProviderError::Decode {
                    provider: provider.to_string(),
                    message: format!("column '{}': {err}", column.name()),
                }
            })?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => json!(row.try_get::<i16, _>(index)?),
        "INT4" => json!(row.try_get::<i32, _>(index)?),
        "INT8" => json!(row.try_get::<i64, _>(index)?),
        "FLOAT4" => json!(row.try_get::<f32, _>(index)?),
        "FLOAT8" => json!(row.try_get::<f64, _>(index)?),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "TIMESTAMP" => Value::String(row.try_get::<NaiveDateTime, _>(index)?.to_string()),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TEXT[]" | "VARCHAR[]" => json!(row.try_get::<Vec<String>, _>(index)?),
        "INT4[]" => json!(row.try_get::<Vec<i32>, _>(index)?),
        "INT8[]" => json!(row.try_get::<Vec<i64>, _>(index)?),
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}
