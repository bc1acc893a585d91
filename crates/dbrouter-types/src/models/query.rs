//! Statement parameters and result rows.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// One positional statement parameter (`$1`, `$2`, ...).
pub type SqlParam = serde_json::Value;

/// Rows returned by a statement plus the affected/returned row count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>, row_count: u64) -> Self {
        Self { rows, row_count }
    }

    /// Result whose row count equals the number of rows returned.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    /// Deserialize every row into `T`.
    pub fn deserialize_rows<T: DeserializeOwned>(self) -> Result<Vec<T>, serde_json::Error> {
        self.rows.into_iter().map(|row| serde_json::from_value(row.into())).collect()
    }
}
