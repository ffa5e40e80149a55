//! `UPDATE ... FROM (VALUES ...)` compilation.

use tracing::debug;

use crate::compile::assign::{build_assignments, build_returning};
use crate::compile::fields::{select_update_fields, UpdateField};
use crate::compile::options::WriteOptions;
use crate::compile::sequence::sequence;
use crate::compile::statement::{CompiledStatement, MAX_BIND_PARAMETERS};
use crate::compile::values::extract_rows;
use crate::dialect::Dialect;
use crate::expression::ExpressionCompiler;
use crate::record::Record;
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::{BulkError, Result};

/// Alias of the VALUES list joined against the table.
const VALUES_ALIAS: &str = "new_values";

/// Compiles a bulk update of `records`, matched to rows by primary key.
///
/// The VALUES list carries the primary key followed by every update field.
/// Computed fields are compiled once against the statement, not per row.
///
/// Returns `None` if there are no records or no field left to update.
///
/// # Errors
///
/// Returns a configuration error if the table has no primary key, or an
/// update or returning field is unknown, or the statement would exceed the
/// bind parameter limit. Returns an encoding error if a value cannot be
/// converted to its column type.
pub fn compile_bulk_update<R: Record>(
    dialect: &dyn Dialect,
    compiler: &dyn ExpressionCompiler,
    table: &TableDescriptor,
    records: &[R],
    update_fields: Option<&[UpdateField]>,
    options: &WriteOptions,
) -> Result<Option<CompiledStatement>> {
    let pk = table.primary_key_column().ok_or_else(|| {
        BulkError::Configuration(format!(
            "Table '{}' has no primary key; bulk update needs one",
            table.name()
        ))
    })?;

    let targets = select_update_fields(table, update_fields, &options.exclude)?;
    let returning = build_returning(dialect, table, &options.returning, false)?;

    if records.is_empty() || targets.is_empty() {
        debug!(
            table = %table.name(),
            records = records.len(),
            fields = targets.len(),
            "Nothing to update"
        );
        return Ok(None);
    }

    let ordered = sequence(records, &[pk])?;

    let value_columns: Vec<&ColumnDescriptor> = std::iter::once(pk)
        .chain(targets.iter().map(|t| t.column))
        .collect();
    let value_names: Vec<String> = value_columns.iter().map(|c| c.column.clone()).collect();
    let values = extract_rows(dialect, compiler, table, &ordered, &value_columns)?;

    let assignments = build_assignments(
        dialect,
        compiler,
        table,
        &targets,
        VALUES_ALIAS,
        Some(value_names.as_slice()),
        options.skip_unchanged,
    )?;

    let quote = |name: &str| dialect.quote_identifier(name);
    let table_sql = quote(table.name());
    let pk_sql = quote(&pk.column);

    let mut sql = format!(
        "UPDATE {table} SET {set} FROM (VALUES {values}) AS {alias} ({names}) WHERE {table}.{pk} = {alias}.{pk}",
        table = table_sql,
        set = assignments.set_sql,
        values = values.sql(),
        alias = VALUES_ALIAS,
        names = value_names
            .iter()
            .map(|n| quote(n))
            .collect::<Vec<_>>()
            .join(", "),
        pk = pk_sql,
    );

    if let Some(predicate) = assignments.predicate {
        sql.push_str(" AND ");
        sql.push_str(&predicate);
    }
    if let Some(returning_sql) = &returning.sql {
        sql.push(' ');
        sql.push_str(returning_sql);
    }

    if values.args.len() > MAX_BIND_PARAMETERS {
        return Err(BulkError::Configuration(format!(
            "Bulk update of {} rows needs {} parameters; PostgreSQL allows {}",
            ordered.len(),
            values.args.len(),
            MAX_BIND_PARAMETERS
        )));
    }

    let statement = CompiledStatement {
        sql,
        args: values.args,
        output_columns: returning.columns,
        has_status: false,
    };

    debug!(
        table = %table.name(),
        rows = ordered.len(),
        args = statement.args.len(),
        sql = %statement.preview(),
        "Compiled bulk update"
    );

    Ok(Some(statement))
}
