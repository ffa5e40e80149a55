//! Storage-level values and their mapping to the PostgreSQL wire.
//!
//! [`ExtractedValue`] is the literal a column's converter produces and the
//! unit bound to each placeholder. Binding is typed by the target column so
//! NULLs and text-transported values announce the right type to the server.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::{Arguments, Column, Decode, Encode, Postgres, Row as SqlxRow, Type, TypeInfo};
use uuid::Uuid;

use crate::schema::ColumnType;
use crate::{BulkError, Result};

/// A value in its storage representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValue {
    /// NULL value
    Null,
    /// Boolean (BOOLEAN)
    Bool(bool),
    /// Small integer (SMALLINT)
    SmallInt(i16),
    /// Integer (INTEGER)
    Int(i32),
    /// Big integer (BIGINT)
    BigInt(i64),
    /// Single-precision float (REAL)
    Float(f32),
    /// Double-precision float (DOUBLE PRECISION)
    Double(f64),
    /// Variable-length string (VARCHAR, TEXT)
    String(String),
    /// Binary data (BYTEA)
    Bytes(Vec<u8>),
    /// UUID (UUID)
    Uuid(Uuid),
    /// Date (DATE)
    Date(NaiveDate),
    /// Time (TIME)
    Time(NaiveTime),
    /// Timestamp without timezone (TIMESTAMP)
    Timestamp(NaiveDateTime),
    /// Timestamp with timezone (TIMESTAMPTZ)
    TimestampTz(DateTime<Utc>),
    /// JSON/JSONB (JSON, JSONB)
    Json(JsonValue),
    /// Array of values (ARRAY)
    Array(Vec<ExtractedValue>),
    /// Decimal/Numeric (NUMERIC, DECIMAL)
    Decimal(Decimal),
}

impl ExtractedValue {
    /// Returns the PostgreSQL type name for this value.
    pub fn pg_type_name(&self) -> &'static str {
        match self {
            ExtractedValue::Null => "NULL",
            ExtractedValue::Bool(_) => "BOOLEAN",
            ExtractedValue::SmallInt(_) => "SMALLINT",
            ExtractedValue::Int(_) => "INTEGER",
            ExtractedValue::BigInt(_) => "BIGINT",
            ExtractedValue::Float(_) => "REAL",
            ExtractedValue::Double(_) => "DOUBLE PRECISION",
            ExtractedValue::String(_) => "TEXT",
            ExtractedValue::Bytes(_) => "BYTEA",
            ExtractedValue::Uuid(_) => "UUID",
            ExtractedValue::Date(_) => "DATE",
            ExtractedValue::Time(_) => "TIME",
            ExtractedValue::Timestamp(_) => "TIMESTAMP",
            ExtractedValue::TimestampTz(_) => "TIMESTAMPTZ",
            ExtractedValue::Json(_) => "JSONB",
            ExtractedValue::Array(_) => "ARRAY",
            ExtractedValue::Decimal(_) => "NUMERIC",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExtractedValue::Null)
    }

    /// Text form of a scalar, as PostgreSQL would accept it on input.
    ///
    /// Returns `None` for NULL, bytes and arrays.
    pub fn to_text(&self) -> Option<String> {
        Some(match self {
            ExtractedValue::Bool(v) => v.to_string(),
            ExtractedValue::SmallInt(v) => v.to_string(),
            ExtractedValue::Int(v) => v.to_string(),
            ExtractedValue::BigInt(v) => v.to_string(),
            ExtractedValue::Float(v) => v.to_string(),
            ExtractedValue::Double(v) => v.to_string(),
            ExtractedValue::Decimal(v) => v.to_string(),
            ExtractedValue::String(v) => v.clone(),
            ExtractedValue::Uuid(v) => v.to_string(),
            ExtractedValue::Date(v) => v.to_string(),
            ExtractedValue::Time(v) => v.to_string(),
            ExtractedValue::Timestamp(v) => v.to_string(),
            ExtractedValue::TimestampTz(v) => v.to_rfc3339(),
            ExtractedValue::Json(v) => v.to_string(),
            ExtractedValue::Null | ExtractedValue::Bytes(_) | ExtractedValue::Array(_) => return None,
        })
    }

    /// Converts the value to JSON.
    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(match self {
            ExtractedValue::Null => JsonValue::Null,
            ExtractedValue::Bool(v) => JsonValue::Bool(*v),
            ExtractedValue::SmallInt(v) => JsonValue::Number((*v).into()),
            ExtractedValue::Int(v) => JsonValue::Number((*v).into()),
            ExtractedValue::BigInt(v) => JsonValue::Number((*v).into()),
            ExtractedValue::Float(v) => serde_json::Number::from_f64(f64::from(*v))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ExtractedValue::Double(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ExtractedValue::Bytes(v) => {
                // Encode bytes as hex string
                JsonValue::String(v.iter().map(|b| format!("{:02x}", b)).collect())
            }
            ExtractedValue::Json(v) => v.clone(),
            ExtractedValue::Array(values) => JsonValue::Array(
                values
                    .iter()
                    .map(ExtractedValue::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            other => JsonValue::String(other.to_text().unwrap_or_default()),
        })
    }

    /// Total order used to sequence rows before writing.
    ///
    /// Values of one column compare by their natural storage order; NULL
    /// sorts after every non-NULL value, as it does under `ORDER BY ... ASC`.
    pub fn storage_cmp(&self, other: &Self) -> Ordering {
        use ExtractedValue as V;

        match (self, other) {
            (V::Null, V::Null) => Ordering::Equal,
            (V::Null, _) => Ordering::Greater,
            (_, V::Null) => Ordering::Less,
            (V::Bool(a), V::Bool(b)) => a.cmp(b),
            (V::String(a), V::String(b)) => a.cmp(b),
            (V::Bytes(a), V::Bytes(b)) => a.cmp(b),
            (V::Uuid(a), V::Uuid(b)) => a.cmp(b),
            (V::Date(a), V::Date(b)) => a.cmp(b),
            (V::Time(a), V::Time(b)) => a.cmp(b),
            (V::Timestamp(a), V::Timestamp(b)) => a.cmp(b),
            (V::TimestampTz(a), V::TimestampTz(b)) => a.cmp(b),
            (V::Decimal(a), V::Decimal(b)) => a.cmp(b),
            (V::Json(a), V::Json(b)) => a.to_string().cmp(&b.to_string()),
            (V::Array(a), V::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.storage_cmp(y) {
                        Ordering::Equal => continue,
                        unequal => return unequal,
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.total_cmp(&y),
                    _ => a.rank().cmp(&b.rank()),
                },
            },
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            ExtractedValue::SmallInt(v) => Some(i64::from(*v)),
            ExtractedValue::Int(v) => Some(i64::from(*v)),
            ExtractedValue::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ExtractedValue::Float(v) => Some(f64::from(*v)),
            ExtractedValue::Double(v) => Some(*v),
            ExtractedValue::Decimal(v) => v.to_f64(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ExtractedValue::Bool(_) => 0,
            ExtractedValue::SmallInt(_)
            | ExtractedValue::Int(_)
            | ExtractedValue::BigInt(_)
            | ExtractedValue::Float(_)
            | ExtractedValue::Double(_)
            | ExtractedValue::Decimal(_) => 1,
            ExtractedValue::String(_) => 2,
            ExtractedValue::Bytes(_) => 3,
            ExtractedValue::Uuid(_) => 4,
            ExtractedValue::Date(_) => 5,
            ExtractedValue::Time(_) => 6,
            ExtractedValue::Timestamp(_) => 7,
            ExtractedValue::TimestampTz(_) => 8,
            ExtractedValue::Json(_) => 9,
            ExtractedValue::Array(_) => 10,
            ExtractedValue::Null => 11,
        }
    }

    /// Binds this value as the next positional parameter.
    ///
    /// # Arguments
    ///
    /// * `arguments` - Argument buffer of the statement
    /// * `column_type` - Storage type of the target column; types NULLs
    /// * `named_type` - When set, the value travels as text announced under
    ///   this type name (JSON and registered custom types)
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the value does not fit the column type.
    pub fn bind_to_arguments(
        &self,
        arguments: &mut PgArguments,
        column_type: &ColumnType,
        named_type: Option<&'static str>,
    ) -> Result<()> {
        if let Some(type_name) = named_type {
            let text = match self {
                ExtractedValue::Null => None,
                other => Some(other.to_text().ok_or_else(|| {
                    BulkError::Encoding(format!(
                        "Cannot send {} as {}",
                        other.pg_type_name(),
                        type_name
                    ))
                })?),
            };
            return add(arguments, NamedText { type_name, text: text.as_deref() }, type_name);
        }

        match self {
            ExtractedValue::Null => bind_null(arguments, column_type),
            ExtractedValue::Bool(v) => add(arguments, *v, "BOOL"),
            ExtractedValue::SmallInt(v) => add(arguments, *v, "SMALLINT"),
            ExtractedValue::Int(v) => add(arguments, *v, "INT"),
            ExtractedValue::BigInt(v) => add(arguments, *v, "BIGINT"),
            ExtractedValue::Float(v) => add(arguments, *v, "FLOAT"),
            ExtractedValue::Double(v) => add(arguments, *v, "DOUBLE"),
            ExtractedValue::String(v) => add(arguments, v.as_str(), "STRING"),
            ExtractedValue::Bytes(v) => add(arguments, v.as_slice(), "BYTES"),
            ExtractedValue::Uuid(v) => add(arguments, *v, "UUID"),
            ExtractedValue::Date(v) => add(arguments, *v, "DATE"),
            ExtractedValue::Time(v) => add(arguments, *v, "TIME"),
            ExtractedValue::Timestamp(v) => add(arguments, *v, "TIMESTAMP"),
            ExtractedValue::TimestampTz(v) => add(arguments, *v, "TIMESTAMPTZ"),
            ExtractedValue::Json(v) => add(arguments, v.clone(), "JSON"),
            ExtractedValue::Decimal(v) => add(arguments, *v, "DECIMAL"),
            ExtractedValue::Array(values) => match column_type {
                ColumnType::Array(element) => bind_array(arguments, values, element),
                other => Err(BulkError::Encoding(format!(
                    "Cannot bind ARRAY to {} column",
                    other
                ))),
            },
        }
    }
}

impl From<bool> for ExtractedValue {
    fn from(v: bool) -> Self {
        ExtractedValue::Bool(v)
    }
}

impl From<i16> for ExtractedValue {
    fn from(v: i16) -> Self {
        ExtractedValue::SmallInt(v)
    }
}

impl From<i32> for ExtractedValue {
    fn from(v: i32) -> Self {
        ExtractedValue::Int(v)
    }
}

impl From<i64> for ExtractedValue {
    fn from(v: i64) -> Self {
        ExtractedValue::BigInt(v)
    }
}

impl From<f64> for ExtractedValue {
    fn from(v: f64) -> Self {
        ExtractedValue::Double(v)
    }
}

impl From<&str> for ExtractedValue {
    fn from(v: &str) -> Self {
        ExtractedValue::String(v.to_string())
    }
}

impl From<String> for ExtractedValue {
    fn from(v: String) -> Self {
        ExtractedValue::String(v)
    }
}

impl From<Uuid> for ExtractedValue {
    fn from(v: Uuid) -> Self {
        ExtractedValue::Uuid(v)
    }
}

impl From<Decimal> for ExtractedValue {
    fn from(v: Decimal) -> Self {
        ExtractedValue::Decimal(v)
    }
}

impl From<NaiveDate> for ExtractedValue {
    fn from(v: NaiveDate) -> Self {
        ExtractedValue::Date(v)
    }
}

impl From<DateTime<Utc>> for ExtractedValue {
    fn from(v: DateTime<Utc>) -> Self {
        ExtractedValue::TimestampTz(v)
    }
}

impl From<JsonValue> for ExtractedValue {
    fn from(v: JsonValue) -> Self {
        ExtractedValue::Json(v)
    }
}

impl<T: Into<ExtractedValue>> From<Option<T>> for ExtractedValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ExtractedValue::Null)
    }
}

fn add<'q, T>(arguments: &mut PgArguments, value: T, label: &str) -> Result<()>
where
    T: Encode<'q, Postgres> + Type<Postgres> + 'q,
{
    arguments
        .add(value)
        .map_err(|e| BulkError::Encoding(format!("Failed to bind {}: {}", label, e)))
}

/// Binds a NULL typed after the target column.
fn bind_null(arguments: &mut PgArguments, column_type: &ColumnType) -> Result<()> {
    match column_type {
        ColumnType::Boolean => add(arguments, Option::<bool>::None, "NULL"),
        ColumnType::SmallInt => add(arguments, Option::<i16>::None, "NULL"),
        ColumnType::Integer => add(arguments, Option::<i32>::None, "NULL"),
        ColumnType::BigInt => add(arguments, Option::<i64>::None, "NULL"),
        ColumnType::Real => add(arguments, Option::<f32>::None, "NULL"),
        ColumnType::DoublePrecision => add(arguments, Option::<f64>::None, "NULL"),
        ColumnType::Numeric(_, _) => add(arguments, Option::<Decimal>::None, "NULL"),
        ColumnType::Text | ColumnType::Varchar(_) => add(arguments, Option::<String>::None, "NULL"),
        ColumnType::Bytea => add(arguments, Option::<Vec<u8>>::None, "NULL"),
        ColumnType::Uuid => add(arguments, Option::<Uuid>::None, "NULL"),
        ColumnType::Date => add(arguments, Option::<NaiveDate>::None, "NULL"),
        ColumnType::Time => add(arguments, Option::<NaiveTime>::None, "NULL"),
        ColumnType::Timestamp => add(arguments, Option::<NaiveDateTime>::None, "NULL"),
        ColumnType::TimestampTz => add(arguments, Option::<DateTime<Utc>>::None, "NULL"),
        ColumnType::Json | ColumnType::Jsonb => add(arguments, Option::<JsonValue>::None, "NULL"),
        ColumnType::Array(element) => match element.as_ref() {
            ColumnType::Boolean => add(arguments, Option::<Vec<bool>>::None, "NULL"),
            ColumnType::SmallInt => add(arguments, Option::<Vec<i16>>::None, "NULL"),
            ColumnType::Integer => add(arguments, Option::<Vec<i32>>::None, "NULL"),
            ColumnType::BigInt => add(arguments, Option::<Vec<i64>>::None, "NULL"),
            ColumnType::Real => add(arguments, Option::<Vec<f32>>::None, "NULL"),
            ColumnType::DoublePrecision => add(arguments, Option::<Vec<f64>>::None, "NULL"),
            ColumnType::Numeric(_, _) => add(arguments, Option::<Vec<Decimal>>::None, "NULL"),
            ColumnType::Bytea => add(arguments, Option::<Vec<Vec<u8>>>::None, "NULL"),
            ColumnType::Uuid => add(arguments, Option::<Vec<Uuid>>::None, "NULL"),
            ColumnType::Date => add(arguments, Option::<Vec<NaiveDate>>::None, "NULL"),
            ColumnType::Time => add(arguments, Option::<Vec<NaiveTime>>::None, "NULL"),
            ColumnType::Timestamp => add(arguments, Option::<Vec<NaiveDateTime>>::None, "NULL"),
            ColumnType::TimestampTz => add(arguments, Option::<Vec<DateTime<Utc>>>::None, "NULL"),
            ColumnType::Json | ColumnType::Jsonb => add(arguments, Option::<Vec<JsonValue>>::None, "NULL"),
            _ => add(arguments, Option::<Vec<String>>::None, "NULL"),
        },
        // Untyped text; the statement's cast decides
        ColumnType::Custom(_) => add(arguments, Option::<String>::None, "NULL"),
    }
}

/// Collects array elements of one variant, keeping NULL elements.
fn elements<T>(
    values: &[ExtractedValue],
    label: &str,
    pick: impl Fn(&ExtractedValue) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    values
        .iter()
        .map(|v| match v {
            ExtractedValue::Null => Ok(None),
            other => pick(other).map(Some).ok_or_else(|| {
                BulkError::Encoding(format!(
                    "Array element {} does not match {}[]",
                    other.pg_type_name(),
                    label
                ))
            }),
        })
        .collect()
}

/// Binds a homogeneous array as a native PostgreSQL array.
fn bind_array(arguments: &mut PgArguments, values: &[ExtractedValue], element: &ColumnType) -> Result<()> {
    use ExtractedValue as V;

    match element {
        ColumnType::Boolean => add(
            arguments,
            elements(values, "BOOL", |v| match v { V::Bool(b) => Some(*b), _ => None })?,
            "BOOL[]",
        ),
        ColumnType::SmallInt => add(
            arguments,
            elements(values, "INT2", |v| match v { V::SmallInt(i) => Some(*i), _ => None })?,
            "INT2[]",
        ),
        ColumnType::Integer => add(
            arguments,
            elements(values, "INT4", |v| match v { V::Int(i) => Some(*i), _ => None })?,
            "INT4[]",
        ),
        ColumnType::BigInt => add(
            arguments,
            elements(values, "INT8", |v| match v { V::BigInt(i) => Some(*i), _ => None })?,
            "INT8[]",
        ),
        ColumnType::Real => add(
            arguments,
            elements(values, "FLOAT4", |v| match v { V::Float(f) => Some(*f), _ => None })?,
            "FLOAT4[]",
        ),
        ColumnType::DoublePrecision => add(
            arguments,
            elements(values, "FLOAT8", |v| match v { V::Double(f) => Some(*f), _ => None })?,
            "FLOAT8[]",
        ),
        ColumnType::Numeric(_, _) => add(
            arguments,
            elements(values, "NUMERIC", |v| match v { V::Decimal(d) => Some(*d), _ => None })?,
            "NUMERIC[]",
        ),
        ColumnType::Text | ColumnType::Varchar(_) => add(
            arguments,
            elements(values, "TEXT", |v| match v { V::String(s) => Some(s.clone()), _ => None })?,
            "TEXT[]",
        ),
        ColumnType::Bytea => add(
            arguments,
            elements(values, "BYTEA", |v| match v { V::Bytes(b) => Some(b.clone()), _ => None })?,
            "BYTEA[]",
        ),
        ColumnType::Uuid => add(
            arguments,
            elements(values, "UUID", |v| match v { V::Uuid(u) => Some(*u), _ => None })?,
            "UUID[]",
        ),
        ColumnType::Date => add(
            arguments,
            elements(values, "DATE", |v| match v { V::Date(d) => Some(*d), _ => None })?,
            "DATE[]",
        ),
        ColumnType::Time => add(
            arguments,
            elements(values, "TIME", |v| match v { V::Time(t) => Some(*t), _ => None })?,
            "TIME[]",
        ),
        ColumnType::Timestamp => add(
            arguments,
            elements(values, "TIMESTAMP", |v| match v { V::Timestamp(t) => Some(*t), _ => None })?,
            "TIMESTAMP[]",
        ),
        ColumnType::TimestampTz => add(
            arguments,
            elements(values, "TIMESTAMPTZ", |v| match v { V::TimestampTz(t) => Some(*t), _ => None })?,
            "TIMESTAMPTZ[]",
        ),
        // Sent as jsonb[]; the statement casts json[] targets
        ColumnType::Json | ColumnType::Jsonb => add(
            arguments,
            elements(values, "JSONB", |v| match v { V::Json(j) => Some(j.clone()), _ => None })?,
            "JSONB[]",
        ),
        other => Err(BulkError::Encoding(format!(
            "Arrays of {} are not supported as parameters",
            other
        ))),
    }
}

/// A text-encoded value announced to the server under an explicit type name.
///
/// JSON and registered custom types (enums, domains) share their text and
/// binary encodings, so the text bytes are a valid binary value.
struct NamedText<'a> {
    type_name: &'static str,
    text: Option<&'a str>,
}

impl Type<Postgres> for NamedText<'_> {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'q> Encode<'q, Postgres> for NamedText<'_> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> std::result::Result<IsNull, BoxDynError> {
        match self.text {
            Some(text) => <&str as Encode<'_, Postgres>>::encode_by_ref(&text, buf),
            None => Ok(IsNull::Yes),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(PgTypeInfo::with_name(self.type_name))
    }
}

/// Decodes a returned row positionally.
///
/// # Errors
///
/// Returns an encoding error if a column cannot be decoded.
pub fn row_values(row: &PgRow) -> Result<Vec<ExtractedValue>> {
    (0..row.columns().len())
        .map(|idx| decode_column(row, idx))
        .collect()
}

/// Column names of a returned row, in order.
pub fn row_column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn get<T>(row: &PgRow, idx: usize, wrap: impl Fn(T) -> ExtractedValue) -> Result<ExtractedValue>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => Ok(wrap(v)),
        Ok(None) => Ok(ExtractedValue::Null),
        Err(e) => Err(BulkError::Encoding(format!(
            "Failed to decode column {}: {}",
            idx, e
        ))),
    }
}

fn get_array<T>(row: &PgRow, idx: usize, wrap: impl Fn(T) -> ExtractedValue) -> Result<ExtractedValue>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres> + sqlx::postgres::PgHasArrayType,
{
    get::<Vec<Option<T>>>(row, idx, |items| {
        ExtractedValue::Array(
            items
                .into_iter()
                .map(|item| item.map(&wrap).unwrap_or(ExtractedValue::Null))
                .collect(),
        )
    })
}

fn decode_column(row: &PgRow, idx: usize) -> Result<ExtractedValue> {
    let type_name = row.columns()[idx].type_info().name().to_string();

    match type_name.as_str() {
        "BOOL" => get(row, idx, ExtractedValue::Bool),
        "INT2" => get(row, idx, ExtractedValue::SmallInt),
        "INT4" => get(row, idx, ExtractedValue::Int),
        "INT8" => get(row, idx, ExtractedValue::BigInt),
        "FLOAT4" => get(row, idx, ExtractedValue::Float),
        "FLOAT8" => get(row, idx, ExtractedValue::Double),
        "NUMERIC" => get(row, idx, ExtractedValue::Decimal),
        "VARCHAR" | "TEXT" | "CHAR" | "BPCHAR" | "NAME" => get(row, idx, ExtractedValue::String),
        "BYTEA" => get(row, idx, ExtractedValue::Bytes),
        "UUID" => get(row, idx, ExtractedValue::Uuid),
        "DATE" => get(row, idx, ExtractedValue::Date),
        "TIME" => get(row, idx, ExtractedValue::Time),
        "TIMESTAMP" => get(row, idx, ExtractedValue::Timestamp),
        "TIMESTAMPTZ" => get(row, idx, ExtractedValue::TimestampTz),
        "JSON" | "JSONB" => get(row, idx, ExtractedValue::Json),
        "_BOOL" => get_array(row, idx, ExtractedValue::Bool),
        "_INT2" => get_array(row, idx, ExtractedValue::SmallInt),
        "_INT4" => get_array(row, idx, ExtractedValue::Int),
        "_INT8" => get_array(row, idx, ExtractedValue::BigInt),
        "_FLOAT4" => get_array(row, idx, ExtractedValue::Float),
        "_FLOAT8" => get_array(row, idx, ExtractedValue::Double),
        "_NUMERIC" => get_array(row, idx, ExtractedValue::Decimal),
        "_TEXT" | "_VARCHAR" | "_CHAR" | "_BPCHAR" | "_NAME" => {
            get_array(row, idx, ExtractedValue::String)
        }
        "_BYTEA" => get_array(row, idx, ExtractedValue::Bytes),
        "_UUID" => get_array(row, idx, ExtractedValue::Uuid),
        "_DATE" => get_array(row, idx, ExtractedValue::Date),
        "_TIME" => get_array(row, idx, ExtractedValue::Time),
        "_TIMESTAMP" => get_array(row, idx, ExtractedValue::Timestamp),
        "_TIMESTAMPTZ" => get_array(row, idx, ExtractedValue::TimestampTz),
        "_JSON" | "_JSONB" => get_array(row, idx, ExtractedValue::Json),
        // Array binary form carries a header, never plain text
        unknown if matches!(row.columns()[idx].type_info().kind(), PgTypeKind::Array(_)) => {
            Err(BulkError::Encoding(format!(
                "Cannot decode array column {} of type '{}'",
                idx, unknown
            )))
        }
        // Enums, domains and extension types: their binary form is text
        unknown => {
            tracing::debug!(type_name = %unknown, column = idx, "Decoding custom type as text");
            match row.try_get_unchecked::<Option<String>, _>(idx) {
                Ok(Some(v)) => Ok(ExtractedValue::String(v)),
                Ok(None) => Ok(ExtractedValue::Null),
                Err(e) => Err(BulkError::Encoding(format!(
                    "Failed to decode '{}' column {}: {}",
                    unknown, idx, e
                ))),
            }
        }
    }
}
