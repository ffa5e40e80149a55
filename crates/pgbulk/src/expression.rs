//! Server-side expressions for computed updates.
//!
//! An [`Expression`] is compiled to a [`SqlFragment`] by an
//! [`ExpressionCompiler`] and spliced into the statement text. This is the one
//! place where parameter binding is bypassed: values inside an expression are
//! rendered as literals by the dialect. A [`SqlFragment`] can only be built
//! inside this crate, so caller-supplied strings never reach the SQL text.
//!
//! # Example
//!
//! ```rust
//! use pgbulk::Expression;
//!
//! // Increment the stored counter by the incoming amount on conflict
//! let expr = Expression::column("count").add(Expression::incoming("count"));
//! ```

use serde::{Deserialize, Serialize};

use crate::dialect::{validate_type_name, Dialect};
use crate::schema::{ColumnType, TableDescriptor};
use crate::{BulkError, ExtractedValue, Result};

/// Binary operators supported in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// String/array concatenation (`||`)
    Concat,
}

impl BinaryOperator {
    /// Converts to SQL operator string.
    pub fn to_sql(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Concat => "||",
        }
    }
}

/// An expression evaluated by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Currently stored value of a column of the target table
    Column(String),
    /// Proposed new value of a column (`EXCLUDED` in upsert, `new_values` in bulk update)
    Incoming(String),
    /// Constant, rendered as a literal
    Value(ExtractedValue),
    Binary(Box<Expression>, BinaryOperator, Box<Expression>),
    /// Function call by name
    Function(String, Vec<Expression>),
    Coalesce(Vec<Expression>),
    Cast(Box<Expression>, ColumnType),
    /// Statement timestamp (`now()`)
    Now,
}

#[allow(clippy::should_implement_trait)]
impl Expression {
    pub fn column(name: &str) -> Self {
        Expression::Column(name.to_string())
    }

    pub fn incoming(name: &str) -> Self {
        Expression::Incoming(name.to_string())
    }

    pub fn value(value: impl Into<ExtractedValue>) -> Self {
        Expression::Value(value.into())
    }

    pub fn function(name: &str, args: Vec<Expression>) -> Self {
        Expression::Function(name.to_string(), args)
    }

    pub fn coalesce(args: Vec<Expression>) -> Self {
        Expression::Coalesce(args)
    }

    pub fn cast(self, column_type: ColumnType) -> Self {
        Expression::Cast(Box::new(self), column_type)
    }

    fn binary(self, op: BinaryOperator, rhs: impl Into<Expression>) -> Self {
        Expression::Binary(Box::new(self), op, Box::new(rhs.into()))
    }

    pub fn add(self, rhs: impl Into<Expression>) -> Self {
        self.binary(BinaryOperator::Add, rhs)
    }

    pub fn sub(self, rhs: impl Into<Expression>) -> Self {
        self.binary(BinaryOperator::Subtract, rhs)
    }

    pub fn mul(self, rhs: impl Into<Expression>) -> Self {
        self.binary(BinaryOperator::Multiply, rhs)
    }

    pub fn div(self, rhs: impl Into<Expression>) -> Self {
        self.binary(BinaryOperator::Divide, rhs)
    }

    pub fn modulo(self, rhs: impl Into<Expression>) -> Self {
        self.binary(BinaryOperator::Modulo, rhs)
    }

    pub fn concat(self, rhs: impl Into<Expression>) -> Self {
        self.binary(BinaryOperator::Concat, rhs)
    }
}

impl From<ExtractedValue> for Expression {
    fn from(value: ExtractedValue) -> Self {
        Expression::Value(value)
    }
}

impl From<i32> for Expression {
    fn from(value: i32) -> Self {
        Expression::Value(ExtractedValue::Int(value))
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Expression::Value(ExtractedValue::BigInt(value))
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::Value(ExtractedValue::Double(value))
    }
}

/// SQL text produced by an expression compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment(String);

impl SqlFragment {
    pub(crate) fn new(sql: String) -> Self {
        SqlFragment(sql)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Where an expression is being compiled.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub dialect: &'a dyn Dialect,
    pub table: &'a TableDescriptor,
    /// Alias of the proposed row, or `None` where no row can be referenced
    /// (inside a VALUES list)
    pub incoming_alias: Option<&'a str>,
    /// Storage columns available under the incoming alias; `None` means all
    pub incoming_columns: Option<&'a [String]>,
}

impl<'a> CompileContext<'a> {
    /// Context of a SET clause.
    pub fn assignment(
        dialect: &'a dyn Dialect,
        table: &'a TableDescriptor,
        incoming_alias: &'a str,
        incoming_columns: Option<&'a [String]>,
    ) -> Self {
        Self {
            dialect,
            table,
            incoming_alias: Some(incoming_alias),
            incoming_columns,
        }
    }

    /// Context of a row value; column references are not allowed.
    pub fn row_value(dialect: &'a dyn Dialect, table: &'a TableDescriptor) -> Self {
        Self {
            dialect,
            table,
            incoming_alias: None,
            incoming_columns: None,
        }
    }
}

/// Compiles expressions to SQL fragments.
pub trait ExpressionCompiler: Send + Sync {
    fn compile(&self, expression: &Expression, context: &CompileContext<'_>) -> Result<SqlFragment>;
}

/// Expression compiler for PostgreSQL.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgExpressionCompiler;

impl ExpressionCompiler for PgExpressionCompiler {
    fn compile(&self, expression: &Expression, context: &CompileContext<'_>) -> Result<SqlFragment> {
        render(expression, context).map(SqlFragment::new)
    }
}

fn render(expression: &Expression, ctx: &CompileContext<'_>) -> Result<String> {
    let quote = |name: &str| ctx.dialect.quote_identifier(name);

    match expression {
        Expression::Column(name) => {
            if ctx.incoming_alias.is_none() {
                return Err(no_references(name));
            }
            let column = ctx.table.require_field(name)?;
            Ok(format!("{}.{}", quote(ctx.table.name()), quote(&column.column)))
        }
        Expression::Incoming(name) => {
            let alias = ctx.incoming_alias.ok_or_else(|| no_references(name))?;
            let column = ctx.table.require_field(name)?;
            if let Some(available) = ctx.incoming_columns {
                if !available.iter().any(|c| *c == column.column) {
                    return Err(BulkError::Configuration(format!(
                        "Field '{}' is not part of the incoming values",
                        name
                    )));
                }
            }
            Ok(format!("{}.{}", alias, quote(&column.column)))
        }
        Expression::Value(value) => ctx.dialect.render_literal(value),
        Expression::Binary(lhs, op, rhs) => Ok(format!(
            "({} {} {})",
            render(lhs, ctx)?,
            op.to_sql(),
            render(rhs, ctx)?
        )),
        Expression::Function(name, args) => {
            validate_type_name(name)?;
            Ok(format!("{}({})", name, render_list(args, ctx)?))
        }
        Expression::Coalesce(args) => {
            if args.is_empty() {
                return Err(BulkError::Configuration(
                    "COALESCE requires at least one argument".to_string(),
                ));
            }
            Ok(format!("COALESCE({})", render_list(args, ctx)?))
        }
        Expression::Cast(inner, column_type) => Ok(format!(
            "({})::{}",
            render(inner, ctx)?,
            column_type.cast_sql(ctx.dialect)?
        )),
        Expression::Now => Ok("now()".to_string()),
    }
}

fn render_list(args: &[Expression], ctx: &CompileContext<'_>) -> Result<String> {
    Ok(args
        .iter()
        .map(|arg| render(arg, ctx))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

fn no_references(name: &str) -> BulkError {
    BulkError::Configuration(format!(
        "Field '{}' cannot be referenced from a row value",
        name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::schema::ColumnDescriptor;

    fn counters() -> TableDescriptor {
        TableDescriptor::new(
            "counters",
            vec![
                ColumnDescriptor::new("id", ColumnType::BigInt).auto_increment(),
                ColumnDescriptor::new("key", ColumnType::Text),
                ColumnDescriptor::new("hits", ColumnType::Integer).db_column("hit_count"),
                ColumnDescriptor::new("label", ColumnType::Text),
            ],
        )
        .unwrap()
    }

    fn compile(expr: &Expression, ctx: &CompileContext<'_>) -> Result<String> {
        PgExpressionCompiler.compile(expr, ctx).map(SqlFragment::into_string)
    }

    #[test]
    fn test_increment_on_conflict() {
        let dialect = PostgresDialect::new();
        let table = counters();
        let ctx = CompileContext::assignment(&dialect, &table, "EXCLUDED", None);

        let expr = Expression::column("hits").add(Expression::incoming("hits"));
        assert_eq!(
            compile(&expr, &ctx).unwrap(),
            "(\"counters\".\"hit_count\" + EXCLUDED.\"hit_count\")"
        );
    }

    #[test]
    fn test_functions_and_literals() {
        let dialect = PostgresDialect::new();
        let table = counters();
        let ctx = CompileContext::assignment(&dialect, &table, "EXCLUDED", None);

        let expr = Expression::function(
            "upper",
            vec![Expression::column("label").concat(Expression::value("it's"))],
        );
        assert_eq!(
            compile(&expr, &ctx).unwrap(),
            "upper((\"counters\".\"label\" || 'it''s'))"
        );

        let expr = Expression::coalesce(vec![Expression::column("hits"), Expression::value(0i32)])
            .cast(ColumnType::BigInt);
        assert_eq!(
            compile(&expr, &ctx).unwrap(),
            "(COALESCE(\"counters\".\"hit_count\", 0))::bigint"
        );

        assert_eq!(compile(&Expression::Now, &ctx).unwrap(), "now()");
    }

    #[test]
    fn test_unknown_column_rejected() {
        let dialect = PostgresDialect::new();
        let table = counters();
        let ctx = CompileContext::assignment(&dialect, &table, "EXCLUDED", None);

        let err = compile(&Expression::column("nope"), &ctx).unwrap_err();
        assert!(matches!(err, BulkError::Configuration(_)));
    }

    #[test]
    fn test_incoming_limited_to_available_columns() {
        let dialect = PostgresDialect::new();
        let table = counters();
        let available = vec!["id".to_string(), "hit_count".to_string()];
        let ctx = CompileContext::assignment(&dialect, &table, "new_values", Some(&available));

        assert_eq!(
            compile(&Expression::incoming("hits"), &ctx).unwrap(),
            "new_values.\"hit_count\""
        );
        assert!(compile(&Expression::incoming("label"), &ctx).is_err());
    }

    #[test]
    fn test_row_value_context_rejects_references() {
        let dialect = PostgresDialect::new();
        let table = counters();
        let ctx = CompileContext::row_value(&dialect, &table);

        assert!(compile(&Expression::column("hits"), &ctx).is_err());
        assert!(compile(&Expression::incoming("hits"), &ctx).is_err());
        assert_eq!(
            compile(&Expression::function("gen_random_uuid", vec![]), &ctx).unwrap(),
            "gen_random_uuid()"
        );
    }

    #[test]
    fn test_function_name_validated() {
        let dialect = PostgresDialect::new();
        let table = counters();
        let ctx = CompileContext::row_value(&dialect, &table);

        let expr = Expression::function("now(); drop table x; --", vec![]);
        assert!(matches!(compile(&expr, &ctx), Err(BulkError::Configuration(_))));
        assert!(compile(&Expression::coalesce(vec![]), &ctx).is_err());
    }
}
