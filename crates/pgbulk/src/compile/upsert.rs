//! `INSERT ... ON CONFLICT` compilation.

use chrono::Utc;
use tracing::debug;

use crate::compile::assign::{build_assignments, build_returning};
use crate::compile::fields::{select_insert_columns, select_update_fields, UpdateField};
use crate::compile::options::WriteOptions;
use crate::compile::sequence::sequence;
use crate::compile::statement::{CompiledStatement, MAX_BIND_PARAMETERS};
use crate::compile::values::extract_rows;
use crate::dialect::Dialect;
use crate::expression::ExpressionCompiler;
use crate::record::{fill_auto_fields, Record};
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::{BulkError, Result};

/// Alias PostgreSQL gives the proposed row in the conflict arm.
const CONFLICT_ALIAS: &str = "EXCLUDED";

/// Compiles an upsert of `records` into `table`.
///
/// Rows are inserted; rows colliding on `unique_fields` take the conflict
/// arm. With no update field left after selection the arm is `DO NOTHING`,
/// otherwise `DO UPDATE SET`, guarded by the skip-unchanged predicate when
/// requested. Auto-timestamp fields of `records` are set to the current time
/// before encoding.
///
/// Returns `None` for an empty batch. Configuration errors are reported
/// even then.
///
/// # Errors
///
/// Returns a configuration error if `unique_fields` is empty, names an
/// unknown or non-writable field, an update or returning field is unknown,
/// or the statement would exceed the bind parameter limit. Returns an
/// encoding error if a value cannot be converted to its column type.
pub fn compile_upsert<R: Record>(
    dialect: &dyn Dialect,
    compiler: &dyn ExpressionCompiler,
    table: &TableDescriptor,
    records: &mut [R],
    unique_fields: &[&str],
    update_fields: Option<&[UpdateField]>,
    options: &WriteOptions,
) -> Result<Option<CompiledStatement>> {
    if unique_fields.is_empty() {
        return Err(BulkError::Configuration(
            "Upsert requires at least one unique field".to_string(),
        ));
    }

    let unique: Vec<&ColumnDescriptor> = unique_fields
        .iter()
        .map(|name| table.require_field(name))
        .collect::<Result<_>>()?;
    if let Some(column) = unique.iter().find(|c| !c.is_writable()) {
        return Err(BulkError::Configuration(format!(
            "Unique field '{}' is not a writable column of '{}'",
            column.name,
            table.name()
        )));
    }

    // Unique columns are never updated
    let mut exclude = options.exclude.clone();
    exclude.extend(unique.iter().map(|c| c.column.clone()));
    let targets = select_update_fields(table, update_fields, &exclude)?;
    let returning = build_returning(dialect, table, &options.returning, true)?;

    if records.is_empty() {
        debug!(table = %table.name(), "Empty upsert batch, nothing to compile");
        return Ok(None);
    }

    fill_auto_fields(table, records, Utc::now());

    let insert_columns = select_insert_columns(table, &unique);
    let ordered = sequence(records, &unique)?;
    let values = extract_rows(dialect, compiler, table, &ordered, &insert_columns)?;

    let quote = |name: &str| dialect.quote_identifier(name);
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({})",
        quote(table.name()),
        insert_columns
            .iter()
            .map(|c| quote(&c.column))
            .collect::<Vec<_>>()
            .join(", "),
        values.sql(),
        unique
            .iter()
            .map(|c| quote(&c.column))
            .collect::<Vec<_>>()
            .join(", ")
    );

    if targets.is_empty() {
        sql.push_str(" DO NOTHING");
    } else {
        let assignments = build_assignments(
            dialect,
            compiler,
            table,
            &targets,
            CONFLICT_ALIAS,
            None,
            options.skip_unchanged,
        )?;
        sql.push_str(" DO UPDATE SET ");
        sql.push_str(&assignments.set_sql);
        if let Some(predicate) = assignments.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
    }

    let has_status = returning.sql.is_some();
    if let Some(returning_sql) = &returning.sql {
        sql.push(' ');
        sql.push_str(returning_sql);
    }

    if values.args.len() > MAX_BIND_PARAMETERS {
        return Err(BulkError::Configuration(format!(
            "Upsert of {} rows needs {} parameters; PostgreSQL allows {}",
            ordered.len(),
            values.args.len(),
            MAX_BIND_PARAMETERS
        )));
    }

    let statement = CompiledStatement {
        sql,
        args: values.args,
        output_columns: returning.columns,
        has_status,
    };

    debug!(
        table = %table.name(),
        rows = ordered.len(),
        args = statement.args.len(),
        sql = %statement.preview(),
        "Compiled upsert"
    );

    Ok(Some(statement))
}
