//! Bulk upsert and bulk update for PostgreSQL.
//!
//! This crate compiles a batch of records into a single SQL statement and runs
//! it in one round trip:
//!
//! - **Upsert**: `INSERT ... VALUES ... ON CONFLICT (...) DO UPDATE SET ...`
//!   (or `DO NOTHING`), optionally skipping rows whose values did not change
//!   and reporting per row whether it was created or updated.
//! - **Bulk update**: `UPDATE ... FROM (VALUES ...) AS new_values WHERE pk = ...`,
//!   updating many rows with different values at once.
//!
//! # Architecture
//!
//! ```text
//!       BulkWriter (writer.rs)
//!           |
//!   Statement compilers (compile/)  <-- TableDescriptor, Record, Expression
//!           |
//!   CompiledStatement ($n SQL + typed args)
//!           |
//!   Execute (executor.rs) --> sqlx PgPool / Transaction
//!           |
//!   ResultRow + created_of / updated_of (result.rs)
//! ```
//!
//! Compilation is pure and synchronous. The only I/O is the single statement
//! handed to [`Execute`].
//!
//! # Key Features
//!
//! - **Typed first row**: the first VALUES group casts every placeholder
//!   (`$1::integer`), so the server infers column types for all rows.
//! - **Deadlock mitigation**: rows are sorted by their conflict key before
//!   compilation, so concurrent batches lock rows in the same order.
//! - **Computed updates**: update fields may be expressions over the stored
//!   value and the incoming value (`"qty" = "stock"."qty" + EXCLUDED."qty"`).
//! - **Security**: identifiers are validated and quoted; values are always
//!   bound, except literals inside compiled expressions, which the dialect
//!   renders.
//!
//! # Usage Examples
//!
//! ## Upsert with status
//!
//! ```rust,ignore
//! use pgbulk::{
//!     created_of, updated_of, BulkWriter, ColumnDescriptor, ColumnType, Connection,
//!     PgExecutor, PoolConfig, PostgresDialect, RowRecord, TableDescriptor, WriteOptions,
//! };
//!
//! # async fn example() -> pgbulk::Result<()> {
//! pgbulk::init(PostgresDialect::new())?;
//!
//! let users = TableDescriptor::new(
//!     "users",
//!     vec![
//!         ColumnDescriptor::new("id", ColumnType::BigInt).auto_increment(),
//!         ColumnDescriptor::new("email", ColumnType::Text),
//!         ColumnDescriptor::new("count", ColumnType::Integer),
//!     ],
//! )?;
//!
//! let conn = Connection::new("postgresql://localhost/db", PoolConfig::default()).await?;
//! let mut writer = BulkWriter::new(PgExecutor::new(conn))?;
//!
//! let mut records = vec![
//!     RowRecord::new().with("email", "a@x.com").with("count", 1i32),
//!     RowRecord::new().with("email", "b@x.com").with("count", 5i32),
//! ];
//! let rows = writer
//!     .upsert(&users, &mut records, &["email"], None, &WriteOptions::new().returning(true))
//!     .await?
//!     .unwrap_or_default();
//!
//! println!("{} created, {} updated", created_of(&rows).len(), updated_of(&rows).len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Bulk update with a computed field
//!
//! ```rust,ignore
//! use pgbulk::{Expression, UpdateField, WriteOptions};
//!
//! let fields = vec![
//!     UpdateField::column("status"),
//!     UpdateField::computed("attempts", Expression::column("attempts").add(1i32)),
//! ];
//! writer
//!     .bulk_update(&tasks, &records, Some(fields.as_slice()), &WriteOptions::new().skip_unchanged(true))
//!     .await?;
//! ```

pub mod compile;
pub mod connection;
pub mod dialect;
pub mod executor;
pub mod expression;
pub mod record;
pub mod result;
pub mod schema;
pub mod types;
pub mod writer;

pub use pgbulk_common::{BulkError, Result};

pub use compile::{
    change_predicate, compile_bulk_update, compile_upsert, select_insert_columns,
    select_update_fields, sequence, CompiledStatement, Returning, SqlArg, UpdateField,
    UpdateTarget, WriteOptions, MAX_BIND_PARAMETERS, STATUS_COLUMN,
};
pub use connection::{Connection, PoolConfig, RetryConfig};
pub use dialect::{
    dialect, init, quote_identifier, quote_literal, validate_identifier, Dialect, PostgresDialect,
};
pub use executor::{Execute, ExecutorConfig, PgExecutor, QueryOutput, TransactionExecutor};
pub use expression::{
    BinaryOperator, CompileContext, Expression, ExpressionCompiler, PgExpressionCompiler,
    SqlFragment,
};
pub use record::{fill_auto_fields, FieldValue, Record, RowRecord};
pub use result::{created_of, materialize, updated_of, ResultRow, RowStatus};
pub use schema::{
    ColumnDescriptor, ColumnFlags, ColumnType, StorageConverter, TableDescriptor, TypeCoercion,
};
pub use types::{row_column_names, row_values, ExtractedValue};
pub use writer::BulkWriter;
