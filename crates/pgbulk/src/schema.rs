//! Table and column descriptors.
//!
//! The host mapping layer describes each table once per call with a
//! [`TableDescriptor`]. Descriptors are immutable inputs: the engine never
//! caches them and recomputes every selection from them on each call.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dialect::{validate_identifier, validate_identifier_part, validate_type_name, Dialect};
use crate::{BulkError, ExtractedValue, Result};

/// PostgreSQL column storage type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// SMALLINT
    SmallInt,
    /// INTEGER
    Integer,
    /// BIGINT
    BigInt,
    /// REAL
    Real,
    /// DOUBLE PRECISION
    DoublePrecision,
    /// NUMERIC(precision, scale)
    Numeric(Option<u32>, Option<u32>),
    /// VARCHAR(length)
    Varchar(Option<u32>),
    /// TEXT
    Text,
    /// BOOLEAN
    Boolean,
    /// BYTEA
    Bytea,
    /// UUID
    Uuid,
    /// DATE
    Date,
    /// TIME
    Time,
    /// TIMESTAMP
    Timestamp,
    /// TIMESTAMPTZ
    TimestampTz,
    /// JSON
    Json,
    /// JSONB
    Jsonb,
    /// ARRAY of type
    Array(Box<ColumnType>),
    /// Custom type (enum, domain, extension type). Must be registered with
    /// the dialect before a statement can cast to it.
    Custom(String),
}

impl ColumnType {
    /// Renders the type as it appears in a `::type` cast.
    pub fn to_sql(&self) -> String {
        match self {
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::DoublePrecision => "double precision".to_string(),
            ColumnType::Numeric(Some(p), Some(s)) => format!("numeric({}, {})", p, s),
            ColumnType::Numeric(Some(p), None) => format!("numeric({})", p),
            ColumnType::Numeric(None, _) => "numeric".to_string(),
            ColumnType::Varchar(Some(n)) => format!("varchar({})", n),
            ColumnType::Varchar(None) => "varchar".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Bytea => "bytea".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Time => "time".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::TimestampTz => "timestamp with time zone".to_string(),
            ColumnType::Json => "json".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::Array(inner) => format!("{}[]", inner.to_sql()),
            ColumnType::Custom(name) => name.clone(),
        }
    }

    /// Renders the cast type, checking custom types against the dialect registry.
    pub fn cast_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        match self {
            ColumnType::Custom(name) => {
                if dialect.custom_type(name).is_none() {
                    return Err(BulkError::Configuration(format!(
                        "Custom type '{}' is not registered with the {} dialect",
                        name,
                        dialect.name()
                    )));
                }
                Ok(self.to_sql())
            }
            ColumnType::Array(inner) => Ok(format!("{}[]", inner.cast_sql(dialect)?)),
            _ => Ok(self.to_sql()),
        }
    }

    /// Name the driver should announce for values bound to this type, when
    /// the value travels as text rather than a native encoding.
    pub fn named_wire_type(&self, dialect: &dyn Dialect) -> Result<Option<&'static str>> {
        match self {
            ColumnType::Json => Ok(Some("json")),
            ColumnType::Custom(name) => dialect.custom_type(name).map(Some).ok_or_else(|| {
                BulkError::Configuration(format!("Custom type '{}' is not registered", name))
            }),
            _ => Ok(None),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Flags describing how the mapping layer manages a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFlags {
    /// Column is the table's primary key
    pub primary_key: bool,
    /// Value is assigned by the database (serial/identity key)
    pub auto_increment: bool,
    /// Computed (GENERATED ALWAYS) column; never written
    pub generated: bool,
    /// Set to the current time when a row is created
    pub auto_now_add: bool,
    /// Set to the current time whenever a row is saved
    pub auto_now: bool,
}

/// Converts a logical value to the literal stored in a column.
pub trait StorageConverter: Send + Sync {
    fn to_storage(&self, value: &ExtractedValue, column_type: &ColumnType) -> Result<ExtractedValue>;
}

/// Default converter: coerces values to the variant the column type stores.
///
/// Bulk VALUES lists are typed by their first row, so every later row must
/// carry the same wire type or PostgreSQL refuses to unify the column.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeCoercion;

impl StorageConverter for TypeCoercion {
    fn to_storage(&self, value: &ExtractedValue, column_type: &ColumnType) -> Result<ExtractedValue> {
        coerce(value, column_type)
    }
}

fn mismatch(value: &ExtractedValue, column_type: &ColumnType) -> BulkError {
    BulkError::Encoding(format!(
        "Cannot store {} value in {} column",
        value.pg_type_name(),
        column_type
    ))
}

fn integer_of(value: &ExtractedValue) -> Option<i64> {
    match value {
        ExtractedValue::SmallInt(v) => Some(i64::from(*v)),
        ExtractedValue::Int(v) => Some(i64::from(*v)),
        ExtractedValue::BigInt(v) => Some(*v),
        ExtractedValue::Decimal(d) if d.fract().is_zero() => d.to_i64(),
        _ => None,
    }
}

/// Narrows a double to a real, rejecting finite values that overflow.
///
/// Fractional precision is rounded the way the server rounds `float8::float4`.
fn narrow_double(value: f64) -> Result<f32> {
    let narrowed = value as f32;
    if value.is_finite() && !narrowed.is_finite() {
        return Err(BulkError::Encoding(format!("{} is out of range for real", value)));
    }
    Ok(narrowed)
}

/// Rejects integers the float type cannot represent exactly.
fn exact_integer(value: i64, converted: f64, column_type: &ColumnType) -> Result<()> {
    // i128 so that 2^63 does not saturate back to i64::MAX
    if converted as i128 != i128::from(value) {
        return Err(BulkError::Encoding(format!(
            "{} cannot be stored exactly in {} column",
            value, column_type
        )));
    }
    Ok(())
}

/// Checks that values of `column_type` can be bound and decoded.
///
/// Arrays must have a built-in scalar element type.
fn validate_column_type(column_type: &ColumnType) -> Result<()> {
    match column_type {
        ColumnType::Custom(type_name) => validate_type_name(type_name),
        ColumnType::Array(element) => match element.as_ref() {
            ColumnType::Array(_) | ColumnType::Custom(_) => Err(BulkError::Configuration(format!(
                "Unsupported array element type '{}'",
                element
            ))),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

fn coerce(value: &ExtractedValue, column_type: &ColumnType) -> Result<ExtractedValue> {
    use ExtractedValue as V;

    if value.is_null() {
        return Ok(V::Null);
    }

    let coerced = match column_type {
        ColumnType::SmallInt => {
            let v = integer_of(value).ok_or_else(|| mismatch(value, column_type))?;
            V::SmallInt(i16::try_from(v).map_err(|_| {
                BulkError::Encoding(format!("{} is out of range for smallint", v))
            })?)
        }
        ColumnType::Integer => {
            let v = integer_of(value).ok_or_else(|| mismatch(value, column_type))?;
            V::Int(i32::try_from(v).map_err(|_| {
                BulkError::Encoding(format!("{} is out of range for integer", v))
            })?)
        }
        ColumnType::BigInt => V::BigInt(integer_of(value).ok_or_else(|| mismatch(value, column_type))?),
        ColumnType::Real => match value {
            V::Float(v) => V::Float(*v),
            V::Double(v) => V::Float(narrow_double(*v)?),
            other => {
                let v = integer_of(other).ok_or_else(|| mismatch(other, column_type))?;
                let f = v as f32;
                exact_integer(v, f64::from(f), column_type)?;
                V::Float(f)
            }
        },
        ColumnType::DoublePrecision => match value {
            V::Float(v) => V::Double(f64::from(*v)),
            V::Double(v) => V::Double(*v),
            V::Decimal(d) => V::Double(d.to_f64().ok_or_else(|| mismatch(value, column_type))?),
            other => {
                let v = integer_of(other).ok_or_else(|| mismatch(other, column_type))?;
                let f = v as f64;
                exact_integer(v, f, column_type)?;
                V::Double(f)
            }
        },
        ColumnType::Numeric(_, _) => match value {
            V::Decimal(d) => V::Decimal(*d),
            V::Double(v) => V::Decimal(Decimal::from_f64(*v).ok_or_else(|| mismatch(value, column_type))?),
            V::Float(v) => V::Decimal(Decimal::from_f32(*v).ok_or_else(|| mismatch(value, column_type))?),
            V::String(s) => V::Decimal(s.parse::<Decimal>().map_err(|e| {
                BulkError::Encoding(format!("Invalid numeric '{}': {}", s, e))
            })?),
            other => V::Decimal(Decimal::from(integer_of(other).ok_or_else(|| mismatch(other, column_type))?)),
        },
        ColumnType::Text | ColumnType::Varchar(_) => match value {
            V::String(s) => V::String(s.clone()),
            V::Uuid(u) => V::String(u.to_string()),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Boolean => match value {
            V::Bool(b) => V::Bool(*b),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Bytea => match value {
            V::Bytes(b) => V::Bytes(b.clone()),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Uuid => match value {
            V::Uuid(u) => V::Uuid(*u),
            V::String(s) => V::Uuid(Uuid::parse_str(s).map_err(|e| {
                BulkError::Encoding(format!("Invalid UUID '{}': {}", s, e))
            })?),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Date => match value {
            V::Date(d) => V::Date(*d),
            V::Timestamp(ts) => V::Date(ts.date()),
            V::TimestampTz(ts) => V::Date(ts.date_naive()),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Time => match value {
            V::Time(t) => V::Time(*t),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Timestamp => match value {
            V::Timestamp(ts) => V::Timestamp(*ts),
            V::TimestampTz(ts) => V::Timestamp(ts.naive_utc()),
            V::Date(d) => V::Timestamp(NaiveDateTime::from(*d)),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::TimestampTz => match value {
            V::TimestampTz(ts) => V::TimestampTz(*ts),
            // Naive timestamps are taken to be UTC
            V::Timestamp(ts) => V::TimestampTz(DateTime::<Utc>::from_naive_utc_and_offset(*ts, Utc)),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Json | ColumnType::Jsonb => match value {
            V::Json(v) => V::Json(v.clone()),
            V::String(s) => V::Json(serde_json::from_str(s)?),
            other => V::Json(other.to_json()?),
        },
        ColumnType::Array(inner) => match value {
            V::Array(items) => V::Array(
                items
                    .iter()
                    .map(|item| coerce(item, inner))
                    .collect::<Result<Vec<_>>>()?,
            ),
            other => return Err(mismatch(other, column_type)),
        },
        ColumnType::Custom(_) => match value {
            V::String(s) => V::String(s.clone()),
            other => V::String(other.to_text().ok_or_else(|| mismatch(other, column_type))?),
        },
    };

    Ok(coerced)
}

/// Describes one column of a table as the mapping layer sees it.
#[derive(Clone)]
pub struct ColumnDescriptor {
    /// Logical attribute name used by records
    pub name: String,
    /// Storage column name
    pub column: String,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    /// Non-concrete (virtual) columns have no storage and are never selected
    pub concrete: bool,
    converter: Arc<dyn StorageConverter>,
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("column_type", &self.column_type)
            .field("flags", &self.flags)
            .field("concrete", &self.concrete)
            .finish()
    }
}

impl ColumnDescriptor {
    /// Creates a concrete column whose storage name equals its logical name.
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column: name.to_string(),
            column_type,
            flags: ColumnFlags::default(),
            concrete: true,
            converter: Arc::new(TypeCoercion),
        }
    }

    /// Sets a storage column name that differs from the logical name.
    pub fn db_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.flags.primary_key = true;
        self
    }

    /// Marks a database-assigned key (serial/identity). Implies primary key.
    pub fn auto_increment(mut self) -> Self {
        self.flags.primary_key = true;
        self.flags.auto_increment = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.flags.generated = true;
        self
    }

    pub fn auto_now(mut self) -> Self {
        self.flags.auto_now = true;
        self
    }

    pub fn auto_now_add(mut self) -> Self {
        self.flags.auto_now_add = true;
        self
    }

    /// Marks the column as virtual (no storage).
    pub fn non_concrete(mut self) -> Self {
        self.concrete = false;
        self
    }

    /// Replaces the storage conversion for this column.
    pub fn converter(mut self, converter: Arc<dyn StorageConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Converts a logical value to its storage literal.
    pub fn to_storage(&self, value: &ExtractedValue) -> Result<ExtractedValue> {
        self.converter
            .to_storage(value, &self.column_type)
            .map_err(|e| match e {
                BulkError::Encoding(msg) => {
                    BulkError::Encoding(format!("column '{}': {}", self.name, msg))
                }
                other => other,
            })
    }

    /// Columns the database writes itself and callers never may.
    pub fn is_writable(&self) -> bool {
        self.concrete && !self.flags.generated
    }

    /// True if `name` refers to this column by logical or storage name.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.column == name
    }
}

/// Describes a table: its name, its columns in declaration order and its
/// primary key.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnDescriptor>,
    primary_key: Option<usize>,
}

impl TableDescriptor {
    /// Creates a table descriptor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an identifier is invalid, two columns
    /// share a name, or more than one column is flagged as primary key.
    pub fn new(name: &str, columns: Vec<ColumnDescriptor>) -> Result<Self> {
        validate_identifier(name)?;

        let mut primary_key = None;
        for (idx, column) in columns.iter().enumerate() {
            validate_identifier_part(&column.name)?;
            validate_identifier_part(&column.column)?;
            validate_column_type(&column.column_type)?;

            let clash = columns[..idx]
                .iter()
                .any(|c| c.name == column.name || c.column == column.column);
            if clash {
                return Err(BulkError::Configuration(format!(
                    "Duplicate column '{}' on table '{}'",
                    column.name, name
                )));
            }

            if column.flags.primary_key {
                if primary_key.is_some() {
                    return Err(BulkError::Configuration(format!(
                        "Table '{}' declares more than one primary key",
                        name
                    )));
                }
                primary_key = Some(idx);
            }
        }

        Ok(Self {
            name: name.to_string(),
            columns,
            primary_key,
        })
    }

    /// Table name (may be schema-qualified).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns in declaration order, virtual ones included.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Concrete, non-generated columns in declaration order.
    pub fn concrete_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_writable())
    }

    pub fn primary_key_column(&self) -> Option<&ColumnDescriptor> {
        self.primary_key.map(|idx| &self.columns[idx])
    }

    /// Looks a column up by logical name, falling back to storage name.
    pub fn field(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.column == name))
    }

    /// Looks a column up, failing with a configuration error when unknown.
    pub fn require_field(&self, name: &str) -> Result<&ColumnDescriptor> {
        self.field(name).ok_or_else(|| {
            BulkError::Configuration(format!(
                "Unknown field '{}' on table '{}'",
                name, self.name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new("id", ColumnType::BigInt).auto_increment(),
                ColumnDescriptor::new("email", ColumnType::Text),
                ColumnDescriptor::new("login_count", ColumnType::Integer).db_column("logins"),
                ColumnDescriptor::new("full_name", ColumnType::Text).generated(),
                ColumnDescriptor::new("display", ColumnType::Text).non_concrete(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_column_type_sql() {
        assert_eq!(ColumnType::Integer.to_sql(), "integer");
        assert_eq!(ColumnType::Numeric(Some(10), Some(2)).to_sql(), "numeric(10, 2)");
        assert_eq!(ColumnType::Varchar(Some(64)).to_sql(), "varchar(64)");
        assert_eq!(ColumnType::Array(Box::new(ColumnType::Text)).to_sql(), "text[]");
        assert_eq!(ColumnType::TimestampTz.to_string(), "timestamp with time zone");
    }

    #[test]
    fn test_field_lookup_by_name_and_column() {
        let table = users();
        assert_eq!(table.field("login_count").unwrap().column, "logins");
        assert_eq!(table.field("logins").unwrap().name, "login_count");
        assert!(table.field("missing").is_none());
        assert!(matches!(
            table.require_field("missing"),
            Err(BulkError::Configuration(_))
        ));
    }

    #[test]
    fn test_primary_key_and_concrete_columns() {
        let table = users();
        assert_eq!(table.primary_key_column().unwrap().name, "id");
        let names: Vec<&str> = table.concrete_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "login_count"]);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let result = TableDescriptor::new(
            "t",
            vec![
                ColumnDescriptor::new("a", ColumnType::Text),
                ColumnDescriptor::new("b", ColumnType::Text).db_column("a"),
            ],
        );
        assert!(matches!(result, Err(BulkError::Configuration(_))));
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let result = TableDescriptor::new(
            "t",
            vec![
                ColumnDescriptor::new("a", ColumnType::Integer).primary_key(),
                ColumnDescriptor::new("b", ColumnType::Integer).primary_key(),
            ],
        );
        assert!(matches!(result, Err(BulkError::Configuration(_))));
    }

    #[test]
    fn test_qualified_column_names_rejected() {
        let result = TableDescriptor::new("t", vec![ColumnDescriptor::new("a.b", ColumnType::Text)]);
        assert!(matches!(result, Err(BulkError::Configuration(_))));

        let result = TableDescriptor::new(
            "t",
            vec![ColumnDescriptor::new("a", ColumnType::Text).db_column("public.a")],
        );
        assert!(matches!(result, Err(BulkError::Configuration(_))));

        // Table names may still be schema-qualified
        assert!(TableDescriptor::new("public.t", vec![ColumnDescriptor::new("a", ColumnType::Text)]).is_ok());
    }

    #[test]
    fn test_unsupported_array_elements_rejected() {
        let nested = ColumnType::Array(Box::new(ColumnType::Array(Box::new(ColumnType::Integer))));
        let custom = ColumnType::Array(Box::new(ColumnType::Custom("mood".to_string())));
        for column_type in [nested, custom] {
            let result = TableDescriptor::new("t", vec![ColumnDescriptor::new("a", column_type)]);
            assert!(matches!(result, Err(BulkError::Configuration(_))));
        }

        let timestamps = ColumnType::Array(Box::new(ColumnType::Timestamp));
        assert!(TableDescriptor::new("t", vec![ColumnDescriptor::new("a", timestamps)]).is_ok());
    }

    #[test]
    fn test_coerce_integers() {
        assert_eq!(
            coerce(&ExtractedValue::Int(7), &ColumnType::BigInt).unwrap(),
            ExtractedValue::BigInt(7)
        );
        assert_eq!(
            coerce(&ExtractedValue::BigInt(7), &ColumnType::SmallInt).unwrap(),
            ExtractedValue::SmallInt(7)
        );
        assert!(matches!(
            coerce(&ExtractedValue::BigInt(i64::MAX), &ColumnType::Integer),
            Err(BulkError::Encoding(_))
        ));
    }

    #[test]
    fn test_coerce_floats_reject_overflow_and_inexact_integers() {
        let ratio = ColumnDescriptor::new("ratio", ColumnType::Real);
        assert!(matches!(
            ratio.to_storage(&ExtractedValue::Double(1e300)),
            Err(BulkError::Encoding(_))
        ));
        assert_eq!(
            ratio.to_storage(&ExtractedValue::Double(0.5)).unwrap(),
            ExtractedValue::Float(0.5)
        );
        assert!(matches!(
            ratio.to_storage(&ExtractedValue::Double(f64::INFINITY)).unwrap(),
            ExtractedValue::Float(f) if f.is_infinite()
        ));

        // 2^24 + 1 and 2^53 + 1 have no exact float representation
        assert!(coerce(&ExtractedValue::BigInt((1 << 24) + 1), &ColumnType::Real).is_err());
        assert!(coerce(&ExtractedValue::BigInt((1 << 53) + 1), &ColumnType::DoublePrecision).is_err());
        assert!(coerce(&ExtractedValue::BigInt(i64::MAX), &ColumnType::DoublePrecision).is_err());
        assert_eq!(
            coerce(&ExtractedValue::BigInt(1 << 53), &ColumnType::DoublePrecision).unwrap(),
            ExtractedValue::Double(9007199254740992.0)
        );
        assert_eq!(
            coerce(&ExtractedValue::Int(-7), &ColumnType::Real).unwrap(),
            ExtractedValue::Float(-7.0)
        );
    }

    #[test]
    fn test_coerce_uuid_and_json_from_text() {
        let uuid = coerce(
            &ExtractedValue::String("67e55044-10b1-426f-9247-bb680e5fe0c8".to_string()),
            &ColumnType::Uuid,
        )
        .unwrap();
        assert!(matches!(uuid, ExtractedValue::Uuid(_)));

        let json = coerce(&ExtractedValue::String("{\"a\": 1}".to_string()), &ColumnType::Jsonb).unwrap();
        assert_eq!(json, ExtractedValue::Json(serde_json::json!({"a": 1})));

        assert!(coerce(&ExtractedValue::String("nope".to_string()), &ColumnType::Uuid).is_err());
    }

    #[test]
    fn test_coerce_numeric_and_timestamps() {
        assert_eq!(
            coerce(&ExtractedValue::Int(3), &ColumnType::Numeric(None, None)).unwrap(),
            ExtractedValue::Decimal(Decimal::from(3))
        );
        assert_eq!(
            coerce(&ExtractedValue::String("1.25".to_string()), &ColumnType::Numeric(None, None)).unwrap(),
            ExtractedValue::Decimal(Decimal::from_str("1.25").unwrap())
        );

        let naive = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        let tz = coerce(&ExtractedValue::Timestamp(naive), &ColumnType::TimestampTz).unwrap();
        assert!(matches!(tz, ExtractedValue::TimestampTz(ts) if ts.naive_utc() == naive));
    }

    #[test]
    fn test_coerce_null_passes_through() {
        assert_eq!(
            coerce(&ExtractedValue::Null, &ColumnType::Uuid).unwrap(),
            ExtractedValue::Null
        );
    }

    #[test]
    fn test_coerce_array_elements() {
        let value = ExtractedValue::Array(vec![ExtractedValue::Int(1), ExtractedValue::Null]);
        let coerced = coerce(&value, &ColumnType::Array(Box::new(ColumnType::BigInt))).unwrap();
        assert_eq!(
            coerced,
            ExtractedValue::Array(vec![ExtractedValue::BigInt(1), ExtractedValue::Null])
        );
    }

    #[test]
    fn test_to_storage_names_column_on_error() {
        let column = ColumnDescriptor::new("flag", ColumnType::Boolean);
        let err = column.to_storage(&ExtractedValue::Int(1)).unwrap_err();
        assert!(err.to_string().contains("column 'flag'"));
    }
}
