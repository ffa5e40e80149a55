//! Compiled statements: SQL text plus positional arguments.

use sqlx::postgres::PgArguments;

use crate::schema::ColumnType;
use crate::{ExtractedValue, Result};

/// PostgreSQL accepts at most this many bind parameters per statement.
pub const MAX_BIND_PARAMETERS: usize = 65535;

/// Name of the synthetic created/updated column in upsert results.
pub const STATUS_COLUMN: &str = "status_";

/// One positional argument, typed by its target column.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlArg {
    pub value: ExtractedValue,
    pub column_type: ColumnType,
    /// Type name announced for text-transported values (json, custom types)
    pub named_type: Option<&'static str>,
}

impl SqlArg {
    /// Binds the argument as the next parameter.
    pub fn bind(&self, arguments: &mut PgArguments) -> Result<()> {
        self.value
            .bind_to_arguments(arguments, &self.column_type, self.named_type)
    }
}

/// A statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    /// Arguments in placeholder order (`$1` first)
    pub args: Vec<SqlArg>,
    /// Returned data columns in order, excluding the status column
    pub output_columns: Vec<String>,
    /// The last returned column is the created/updated status
    pub has_status: bool,
}

impl CompiledStatement {
    /// Counts `$n` placeholders outside quoted literals and identifiers.
    pub fn placeholder_count(&self) -> usize {
        let bytes = self.sql.as_bytes();
        let mut count = 0;
        let mut quote: Option<u8> = None;
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                // Doubled quotes inside a quoted segment close and reopen it
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'\'' || b == b'"' => quote = Some(b),
                None if b == b'$' => {
                    let digits = bytes[i + 1..].iter().take_while(|c| c.is_ascii_digit()).count();
                    if digits > 0 {
                        count += 1;
                        i += digits;
                    }
                }
                None => {}
            }
            i += 1;
        }
        count
    }

    /// First 100 characters of the SQL, for logging.
    pub fn preview(&self) -> &str {
        match self.sql.char_indices().nth(100) {
            Some((idx, _)) => &self.sql[..idx],
            None => &self.sql,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(sql: &str) -> CompiledStatement {
        CompiledStatement {
            sql: sql.to_string(),
            args: vec![],
            output_columns: vec![],
            has_status: false,
        }
    }

    #[test]
    fn test_placeholder_count() {
        assert_eq!(statement("SELECT 1").placeholder_count(), 0);
        assert_eq!(
            statement("VALUES ($1::integer, $2::text), ($3, $4)").placeholder_count(),
            4
        );
        assert_eq!(statement("VALUES ($10, $11)").placeholder_count(), 2);
    }

    #[test]
    fn test_placeholder_count_ignores_quoted() {
        assert_eq!(statement("SELECT '$1', \"$2\", $3").placeholder_count(), 1);
        assert_eq!(statement("SELECT 'it''s $1', $1").placeholder_count(), 1);
    }

    #[test]
    fn test_preview_truncates() {
        let long = statement(&"x".repeat(250));
        assert_eq!(long.preview().len(), 100);
        assert_eq!(statement("short").preview(), "short");
    }
}
