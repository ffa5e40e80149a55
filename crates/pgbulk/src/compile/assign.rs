//! SET clause and RETURNING clause construction shared by both statements.

use crate::compile::fields::UpdateTarget;
use crate::compile::options::Returning;
use crate::compile::predicate::change_predicate;
use crate::compile::statement::STATUS_COLUMN;
use crate::dialect::Dialect;
use crate::expression::{CompileContext, ExpressionCompiler};
use crate::schema::TableDescriptor;
use crate::Result;

/// SET list and optional skip-unchanged predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Assignments {
    pub set_sql: String,
    pub predicate: Option<String>,
}

/// Builds the SET list assigning each target from `alias`, or from its
/// compiled expression, plus the skip-unchanged predicate over the same
/// values.
///
/// `incoming_columns` limits which storage columns `alias` exposes.
pub(crate) fn build_assignments(
    dialect: &dyn Dialect,
    compiler: &dyn ExpressionCompiler,
    table: &TableDescriptor,
    targets: &[UpdateTarget<'_>],
    alias: &str,
    incoming_columns: Option<&[String]>,
    skip_unchanged: bool,
) -> Result<Assignments> {
    let context = CompileContext::assignment(dialect, table, alias, incoming_columns);
    let table_sql = dialect.quote_identifier(table.name());

    let mut set_parts = Vec::with_capacity(targets.len());
    let mut current = Vec::with_capacity(targets.len());
    let mut new = Vec::with_capacity(targets.len());

    for target in targets {
        let column_sql = dialect.quote_identifier(&target.column.column);
        let value_sql = match &target.expression {
            Some(expression) => compiler.compile(expression, &context)?.into_string(),
            None => format!("{}.{}", alias, column_sql),
        };

        set_parts.push(format!("{} = {}", column_sql, value_sql));
        current.push(format!("{}.{}", table_sql, column_sql));
        new.push(value_sql);
    }

    let predicate = if skip_unchanged {
        change_predicate(&current, &new)
    } else {
        None
    };

    Ok(Assignments {
        set_sql: set_parts.join(", "),
        predicate,
    })
}

/// RETURNING clause and the data columns it yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ReturningClause {
    pub sql: Option<String>,
    pub columns: Vec<String>,
}

/// Resolves requested output columns and renders the RETURNING clause.
///
/// With `include_status`, a trailing `status_` column reports whether each
/// row was inserted (`xmax = 0`) or took the conflict arm.
///
/// # Errors
///
/// Returns a configuration error for unknown requested fields.
pub(crate) fn build_returning(
    dialect: &dyn Dialect,
    table: &TableDescriptor,
    returning: &Returning,
    include_status: bool,
) -> Result<ReturningClause> {
    let columns: Vec<String> = match returning {
        Returning::Nothing => Vec::new(),
        Returning::All => table.concrete_columns().map(|c| c.column.clone()).collect(),
        Returning::Columns(names) => names
            .iter()
            .map(|name| table.require_field(name).map(|c| c.column.clone()))
            .collect::<Result<_>>()?,
    };

    if columns.is_empty() {
        return Ok(ReturningClause::default());
    }

    let table_sql = dialect.quote_identifier(table.name());
    let mut parts: Vec<String> = columns
        .iter()
        .map(|column| format!("{}.{}", table_sql, dialect.quote_identifier(column)))
        .collect();
    if include_status {
        parts.push(format!(
            "CASE WHEN xmax = 0 THEN 'created' ELSE 'updated' END AS {}",
            STATUS_COLUMN
        ));
    }

    Ok(ReturningClause {
        sql: Some(format!("RETURNING {}", parts.join(", "))),
        columns,
    })
}
