//! Bulk write statement compilation.
//!
//! This module turns a batch of records and a table descriptor into one SQL
//! statement with positional arguments. Compilation is pure: nothing here
//! touches a connection.
//!
//! # Examples
//!
//! ## Upsert
//!
//! ```ignore
//! use pgbulk::{compile_upsert, PgExpressionCompiler, PostgresDialect, RowRecord, WriteOptions};
//!
//! let mut records = vec![RowRecord::new().with("email", "a@x.com").with("count", 1i32)];
//! let statement = compile_upsert(
//!     &PostgresDialect::new(),
//!     &PgExpressionCompiler,
//!     &users,
//!     &mut records,
//!     &["email"],
//!     None,
//!     &WriteOptions::new().returning(true),
//! )?;
//! // INSERT INTO "users" ("email", "count") VALUES ($1::text, $2::integer)
//! //   ON CONFLICT ("email") DO UPDATE SET "count" = EXCLUDED."count"
//! //   RETURNING "users"."id", "users"."email", "users"."count",
//! //   CASE WHEN xmax = 0 THEN 'created' ELSE 'updated' END AS status_
//! ```
//!
//! ## Bulk update
//!
//! ```ignore
//! use pgbulk::{compile_bulk_update, UpdateField, WriteOptions};
//!
//! let fields = vec![UpdateField::column("status")];
//! let statement = compile_bulk_update(
//!     &dialect,
//!     &PgExpressionCompiler,
//!     &tasks,
//!     &records,
//!     Some(fields.as_slice()),
//!     &WriteOptions::new().skip_unchanged(true),
//! )?;
//! // UPDATE "tasks" SET "status" = new_values."status"
//! //   FROM (VALUES ($1::bigint, $2::text), ($3, $4)) AS new_values ("id", "status")
//! //   WHERE "tasks"."id" = new_values."id"
//! //   AND (("tasks"."status") IS DISTINCT FROM (new_values."status"))
//! ```

mod assign;
mod fields;
mod options;
mod predicate;
mod sequence;
mod statement;
mod update;
mod upsert;
mod values;

#[cfg(test)]
mod tests;

pub use fields::{select_insert_columns, select_update_fields, UpdateField, UpdateTarget};
pub use options::{Returning, WriteOptions};
pub use predicate::change_predicate;
pub use sequence::sequence;
pub use statement::{CompiledStatement, SqlArg, MAX_BIND_PARAMETERS, STATUS_COLUMN};
pub use update::compile_bulk_update;
pub use upsert::compile_upsert;
