//! Pairing of executed statement results into lists and key/value maps.
//!
//! [`to_pairs`] is a pure transformation over rows that were already
//! fetched; [`query_pairs`] is the convenience wrapper that executes a
//! [`Statement`] first. Rows are read through the `with-json`
//! integration, so values come back as [`JsonValue`]s regardless of the
//! backend.

use sea_orm::{ConnectionTrait, FromQueryResult, JsonValue, QueryResult, Statement};
use serde_json::Map as JsonMap;
use thiserror::Error;

/// Module-local result type.
pub type PairsResult<T> = Result<T, PairsError>;

/// Typed error for the result-pairing utility.
#[derive(Debug, Error)]
pub enum PairsError {
    /// The first row carries no column at all, so nothing can be paired.
    #[error("result set does not contain any column")]
    EmptyResultSchema,

    /// A requested column is missing from a result row.
    #[error("column not present in result row: {0}")]
    UnknownColumn(String),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

/// Outcome of a pairing call: a flat list of values (or whole rows), or
/// a map keyed by the stringified key column.
///
/// Whole rows are JSON objects; scalar entries are plain JSON values.
/// Duplicate keys follow last-value-wins.
#[derive(Debug, Clone, PartialEq)]
pub enum Pairs {
    List(Vec<JsonValue>),
    Map(JsonMap<String, JsonValue>),
}

impl Pairs {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(values) => values.len(),
            Self::Map(map) => map.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Execute `stmt` and pair its result set, see [`to_pairs`].
///
/// # Errors
/// Returns an error if the statement fails or the rows cannot be paired.
pub async fn query_pairs<C>(
    conn: &C,
    stmt: Statement,
    key: Option<&str>,
    value: Option<&str>,
) -> PairsResult<Pairs>
where
    C: ConnectionTrait,
{
    let rows = conn.query_all(stmt).await?;
    to_pairs(&rows, key, value)
}

/// Pair a fetched result set into a [`Pairs`] structure.
///
/// Column resolution when both `key` and `value` are `None`:
/// - an empty result set returns an empty structure immediately;
/// - a single column becomes the value column (flat list);
/// - with two or more columns, the first two (in result-set order) become
///   key and value; further columns are ignored.
///
/// An explicitly named column is always used as given. A `key` without a
/// `value` maps keys to whole rows; a `value` without a `key` produces a
/// flat list of that column.
///
/// # Errors
/// - [`PairsError::EmptyResultSchema`] when the first row has no column.
/// - [`PairsError::UnknownColumn`] when a named column is missing from a
///   row.
pub fn to_pairs(
    rows: &[QueryResult],
    key: Option<&str>,
    value: Option<&str>,
) -> PairsResult<Pairs> {
    if rows.is_empty() {
        return Ok(if key.is_some() {
            Pairs::Map(JsonMap::new())
        } else {
            Pairs::List(Vec::new())
        });
    }

    let columns = rows[0].column_names();
    if columns.is_empty() {
        return Err(PairsError::EmptyResultSchema);
    }
    let (key, value) = resolve_columns(&columns, key, value);

    if let Some(key) = key {
        let mut out = JsonMap::new();
        for row in rows {
            let object = row_object(row)?;
            let key_string = key_to_string(
                object
                    .get(&key)
                    .ok_or_else(|| PairsError::UnknownColumn(key.clone()))?,
            );
            let entry = match &value {
                Some(value) => object
                    .get(value)
                    .cloned()
                    .ok_or_else(|| PairsError::UnknownColumn(value.clone()))?,
                None => JsonValue::Object(object),
            };
            out.insert(key_string, entry);
        }
        Ok(Pairs::Map(out))
    } else {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let object = row_object(row)?;
            out.push(match &value {
                Some(value) => object
                    .get(value)
                    .cloned()
                    .ok_or_else(|| PairsError::UnknownColumn(value.clone()))?,
                None => JsonValue::Object(object),
            });
        }
        Ok(Pairs::List(out))
    }
}

fn resolve_columns(
    columns: &[String],
    key: Option<&str>,
    value: Option<&str>,
) -> (Option<String>, Option<String>) {
    match (key, value) {
        (None, None) => {
            if columns.len() == 1 {
                (None, Some(columns[0].clone()))
            } else {
                (Some(columns[0].clone()), Some(columns[1].clone()))
            }
        }
        (key, value) => (key.map(ToOwned::to_owned), value.map(ToOwned::to_owned)),
    }
}

fn row_object(row: &QueryResult) -> PairsResult<JsonMap<String, JsonValue>> {
    match JsonValue::from_query_result(row, "")? {
        JsonValue::Object(object) => Ok(object),
        _ => Err(PairsError::Db(sea_orm::DbErr::Type(
            "row did not decode to a JSON object".to_owned(),
        ))),
    }
}

// Map keys mirror the source column loosely typed: strings verbatim,
// NULL as the empty string, everything else in its canonical rendering.
fn key_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// ===================== tests =====================
