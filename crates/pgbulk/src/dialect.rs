//! Backend capability: identifier quoting, literal rendering and custom
//! type registration.
//!
//! The process selects one [`Dialect`] at startup with [`init`]. Compilers
//! receive the dialect explicitly; only [`BulkWriter::new`](crate::BulkWriter::new)
//! reads the process-wide instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::{BulkError, ExtractedValue, Result};

/// PostgreSQL limit for identifier length in bytes
const MAX_IDENTIFIER_LEN: usize = 63;

/// What the compilers need from the driver that will run the statement.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Quotes a table or column name for interpolation into SQL text.
    fn quote_identifier(&self, name: &str) -> String;

    /// Renders a value as an inline SQL literal.
    ///
    /// Only expression fragments produced by an expression compiler are
    /// rendered this way; row values are always bound as parameters.
    fn render_literal(&self, value: &ExtractedValue) -> Result<String>;

    /// Makes a custom storage type (enum, domain, extension type) castable.
    fn register_custom_type(&self, type_name: &str) -> Result<()>;

    /// Returns the interned name of a registered custom type.
    fn custom_type(&self, type_name: &str) -> Option<&'static str>;
}

/// Dialect for the sqlx PostgreSQL driver.
///
/// Assumes `standard_conforming_strings = on` (the server default), so
/// backslashes in string literals are not escapes.
#[derive(Default)]
pub struct PostgresDialect {
    custom_types: RwLock<HashMap<String, &'static str>>,
}

impl fmt::Debug for PostgresDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDialect")
            .field("custom_types", &self.custom_types.read().len())
            .finish()
    }
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_identifier(name)
    }

    fn render_literal(&self, value: &ExtractedValue) -> Result<String> {
        render_literal(value)
    }

    fn register_custom_type(&self, type_name: &str) -> Result<()> {
        validate_type_name(type_name)?;

        let mut types = self.custom_types.write();
        if !types.contains_key(type_name) {
            // The driver needs 'static type names; the registry lives as long
            // as the process and each name is interned once.
            let interned: &'static str = Box::leak(type_name.to_string().into_boxed_str());
            types.insert(type_name.to_string(), interned);
            info!(type_name = %type_name, "Registered custom type");
        }
        Ok(())
    }

    fn custom_type(&self, type_name: &str) -> Option<&'static str> {
        self.custom_types.read().get(type_name).copied()
    }
}

static DIALECT: OnceCell<Arc<dyn Dialect>> = OnceCell::new();

/// Installs the process-wide dialect. Call once during startup.
///
/// # Errors
///
/// Returns a configuration error if a dialect is already installed.
pub fn init<D: Dialect + 'static>(dialect: D) -> Result<()> {
    let name = dialect.name();
    DIALECT
        .set(Arc::new(dialect))
        .map_err(|_| BulkError::Configuration("Dialect already initialized".to_string()))?;
    info!(dialect = name, "Bulk write dialect initialized");
    Ok(())
}

/// Returns the dialect installed by [`init`].
pub fn dialect() -> Result<Arc<dyn Dialect>> {
    DIALECT.get().cloned().ok_or_else(|| {
        BulkError::Configuration("No dialect installed; call pgbulk::init at startup".to_string())
    })
}

/// Quotes a SQL identifier, doubling embedded quotes.
///
/// Handles schema-qualified names by quoting each part separately.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Validates a table or column name.
///
/// Supports both simple identifiers and schema-qualified names (e.g., "public.users").
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BulkError::Configuration("Identifier cannot be empty".to_string()));
    }

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(BulkError::Configuration(format!(
            "Invalid schema-qualified identifier '{}': must be in format 'schema.table'",
            name
        )));
    }

    for part in parts {
        validate_identifier_part(part)?;
    }
    Ok(())
}

/// Validates a single part of an identifier (no dots allowed).
pub fn validate_identifier_part(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BulkError::Configuration("Identifier part cannot be empty".to_string()));
    }

    // Reject names that change under NFKC to prevent Unicode confusables
    let normalized = name.nfkc().collect::<String>();
    if normalized != name {
        return Err(BulkError::Configuration(format!(
            "Identifier '{}' is not in normalized form",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(BulkError::Configuration(format!(
            "Identifier '{}' exceeds maximum length of {}",
            name, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(BulkError::Configuration(format!(
            "Identifier '{}' contains control character {:?}",
            name, ch
        )));
    }

    Ok(())
}

/// Validates a bare (unquoted) name such as a type or function name.
pub fn validate_type_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if !valid_start || !valid_rest || name.len() > MAX_IDENTIFIER_LEN {
        return Err(BulkError::Configuration(format!("Invalid type or function name '{}'", name)));
    }
    Ok(())
}

/// Quotes a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> Result<String> {
    if value.contains('\0') {
        return Err(BulkError::Encoding(
            "String literals cannot contain NUL characters".to_string(),
        ));
    }
    Ok(format!("'{}'", value.replace('\'', "''")))
}

fn render_literal(value: &ExtractedValue) -> Result<String> {
    use ExtractedValue as V;

    let sql = match value {
        V::Null => "NULL".to_string(),
        V::Bool(v) => v.to_string(),
        // Negatives are parenthesized: `-32768::smallint` casts before negating
        V::SmallInt(v) if *v < 0 => format!("({})::smallint", v),
        V::SmallInt(v) => format!("{}::smallint", v),
        V::Int(v) if *v < 0 => format!("({})::integer", v),
        V::Int(v) => v.to_string(),
        V::BigInt(v) if *v < 0 => format!("({})::bigint", v),
        V::BigInt(v) => format!("{}::bigint", v),
        V::Float(v) if v.is_finite() => format!("{}::real", v),
        V::Double(v) if v.is_finite() => format!("{}::double precision", v),
        V::Float(v) => format!("{}::real", quote_literal(&non_finite(f64::from(*v)))?),
        V::Double(v) => format!("{}::double precision", quote_literal(&non_finite(*v))?),
        V::Decimal(v) => format!("{}::numeric", v),
        V::String(v) => quote_literal(v)?,
        V::Bytes(v) => {
            let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
            format!("'\\x{}'::bytea", hex)
        }
        V::Uuid(v) => format!("'{}'::uuid", v),
        V::Date(v) => format!("'{}'::date", v),
        V::Time(v) => format!("'{}'::time", v),
        V::Timestamp(v) => format!("'{}'::timestamp", v.format("%Y-%m-%d %H:%M:%S%.f")),
        V::TimestampTz(v) => format!("'{}'::timestamptz", v.to_rfc3339()),
        V::Json(v) => format!("{}::jsonb", quote_literal(&v.to_string())?),
        V::Array(items) => {
            if items.is_empty() {
                "'{}'".to_string()
            } else {
                let rendered = items
                    .iter()
                    .map(render_literal)
                    .collect::<Result<Vec<_>>>()?;
                format!("ARRAY[{}]", rendered.join(", "))
            }
        }
    };
    Ok(sql)
}

fn non_finite(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v > 0.0 {
        "Infinity".to_string()
    } else {
        "-Infinity".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("public.users"), "\"public\".\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("public.users").is_ok());
        assert!(validate_identifier("order").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a.b.c").is_err());
        assert!(validate_identifier("bad\nname").is_err());
        assert!(validate_identifier(&"x".repeat(64)).is_err());
        // Fullwidth letters normalize to ASCII under NFKC
        assert!(validate_identifier("ｕsers").is_err());
    }

    #[test]
    fn test_validate_type_name() {
        assert!(validate_type_name("mood").is_ok());
        assert!(validate_type_name("public.mood").is_ok());
        assert!(validate_type_name("upper").is_ok());
        assert!(validate_type_name("1abc").is_err());
        assert!(validate_type_name("drop table").is_err());
        assert!(validate_type_name("").is_err());
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(render_literal(&ExtractedValue::Null).unwrap(), "NULL");
        assert_eq!(render_literal(&ExtractedValue::Bool(true)).unwrap(), "true");
        assert_eq!(render_literal(&ExtractedValue::Int(5)).unwrap(), "5");
        assert_eq!(render_literal(&ExtractedValue::BigInt(5)).unwrap(), "5::bigint");
        assert_eq!(
            render_literal(&ExtractedValue::SmallInt(i16::MIN)).unwrap(),
            "(-32768)::smallint"
        );
        assert_eq!(
            render_literal(&ExtractedValue::Int(i32::MIN)).unwrap(),
            "(-2147483648)::integer"
        );
        assert_eq!(
            render_literal(&ExtractedValue::BigInt(i64::MIN)).unwrap(),
            "(-9223372036854775808)::bigint"
        );
        assert_eq!(
            render_literal(&ExtractedValue::String("it's".to_string())).unwrap(),
            "'it''s'"
        );
        assert_eq!(
            render_literal(&ExtractedValue::Double(f64::NAN)).unwrap(),
            "'NaN'::double precision"
        );
    }

    #[test]
    fn test_render_typed_literals() {
        assert_eq!(
            render_literal(&ExtractedValue::Bytes(vec![0xde, 0xad])).unwrap(),
            "'\\xdead'::bytea"
        );
        assert_eq!(
            render_literal(&ExtractedValue::Uuid(Uuid::nil())).unwrap(),
            "'00000000-0000-0000-0000-000000000000'::uuid"
        );
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(render_literal(&ExtractedValue::Date(date)).unwrap(), "'2024-02-29'::date");
        assert_eq!(
            render_literal(&ExtractedValue::Json(serde_json::json!({"k": "v'"}))).unwrap(),
            "'{\"k\":\"v''\"}'::jsonb"
        );
    }

    #[test]
    fn test_render_arrays() {
        let array = ExtractedValue::Array(vec![ExtractedValue::Int(1), ExtractedValue::Int(2)]);
        assert_eq!(render_literal(&array).unwrap(), "ARRAY[1, 2]");
        assert_eq!(render_literal(&ExtractedValue::Array(vec![])).unwrap(), "'{}'");
    }

    #[test]
    fn test_render_rejects_nul() {
        let value = ExtractedValue::String("a\0b".to_string());
        assert!(matches!(render_literal(&value), Err(BulkError::Encoding(_))));
    }

    #[test]
    fn test_register_custom_type() {
        let dialect = PostgresDialect::new();
        assert!(dialect.custom_type("mood").is_none());
        dialect.register_custom_type("mood").unwrap();
        dialect.register_custom_type("mood").unwrap();
        assert_eq!(dialect.custom_type("mood"), Some("mood"));
        assert!(dialect.register_custom_type("mood; drop").is_err());
    }

    #[test]
    fn test_init_once() {
        init(PostgresDialect::new()).unwrap();
        assert_eq!(dialect().unwrap().name(), "postgres");
        assert!(matches!(
            init(PostgresDialect::new()),
            Err(BulkError::Configuration(_))
        ));
    }
}
