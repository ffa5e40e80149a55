//! Returned rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{BulkError, ExtractedValue, Result};

/// Whether an upserted row was inserted or took the conflict arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Created,
    Updated,
}

impl RowStatus {
    fn parse(value: &ExtractedValue) -> Result<Self> {
        match value {
            ExtractedValue::String(s) if s == "created" => Ok(RowStatus::Created),
            ExtractedValue::String(s) if s == "updated" => Ok(RowStatus::Updated),
            other => Err(BulkError::Internal(format!(
                "Unexpected row status {:?}",
                other
            ))),
        }
    }
}

/// One returned row: named values in RETURNING order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub values: Vec<(String, ExtractedValue)>,
    /// Present for upsert results only
    pub status: Option<RowStatus>,
}

impl ResultRow {
    /// Value of a returned column.
    pub fn get(&self, column: &str) -> Option<&ExtractedValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn is_created(&self) -> bool {
        self.status == Some(RowStatus::Created)
    }

    pub fn is_updated(&self) -> bool {
        self.status == Some(RowStatus::Updated)
    }

    /// Converts the row to a JSON object; the status, if any, is `status_`.
    pub fn to_json(&self) -> Result<JsonValue> {
        let mut map = Map::new();
        for (name, value) in &self.values {
            map.insert(name.clone(), value.to_json()?);
        }
        if let Some(status) = self.status {
            map.insert(
                crate::compile::STATUS_COLUMN.to_string(),
                serde_json::to_value(status)?,
            );
        }
        Ok(JsonValue::Object(map))
    }
}

/// Maps positional rows to named result rows.
///
/// `columns` are the statement's declared data columns. With `has_status`,
/// each row carries one extra trailing status value.
///
/// # Errors
///
/// Returns an internal error if a row's width does not match the columns or
/// a status value is not recognised.
pub fn materialize(
    columns: &[String],
    rows: Vec<Vec<ExtractedValue>>,
    has_status: bool,
) -> Result<Vec<ResultRow>> {
    let expected = columns.len() + usize::from(has_status);

    rows.into_iter()
        .map(|mut row| {
            if row.len() != expected {
                return Err(BulkError::Internal(format!(
                    "Returned row has {} columns, expected {}",
                    row.len(),
                    expected
                )));
            }

            let status = if has_status {
                match row.pop() {
                    Some(value) => Some(RowStatus::parse(&value)?),
                    None => None,
                }
            } else {
                None
            };

            Ok(ResultRow {
                values: columns.iter().cloned().zip(row).collect(),
                status,
            })
        })
        .collect()
}

/// Rows that were inserted.
pub fn created_of(rows: &[ResultRow]) -> Vec<&ResultRow> {
    rows.iter().filter(|r| r.is_created()).collect()
}

/// Rows that took the conflict arm and were updated.
pub fn updated_of(rows: &[ResultRow]) -> Vec<&ResultRow> {
    rows.iter().filter(|r| r.is_updated()).collect()
}
