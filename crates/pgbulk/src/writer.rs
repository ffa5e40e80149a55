//! The bulk write entry points.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use crate::compile::{
    compile_bulk_update, compile_upsert, CompiledStatement, UpdateField, WriteOptions, STATUS_COLUMN,
};
use crate::dialect::{self, Dialect};
use crate::executor::Execute;
use crate::expression::{ExpressionCompiler, PgExpressionCompiler};
use crate::record::Record;
use crate::result::{materialize, ResultRow};
use crate::schema::TableDescriptor;
use crate::{BulkError, Result};

/// Compiles bulk writes and runs them through an [`Execute`] implementation.
///
/// Each call compiles one statement and executes it in one round trip.
/// Nothing is cached between calls.
///
/// # Example
///
/// ```ignore
/// use pgbulk::{BulkWriter, Connection, PgExecutor, PoolConfig, PostgresDialect, RowRecord, WriteOptions};
///
/// pgbulk::init(PostgresDialect::new())?;
/// let connection = Connection::new(&url, PoolConfig::from_env()?).await?;
/// let mut writer = BulkWriter::new(PgExecutor::new(connection))?;
///
/// let mut records = vec![RowRecord::new().with("email", "a@x.com").with("count", 1i32)];
/// let rows = writer
///     .upsert(&users, &mut records, &["email"], None, &WriteOptions::new().returning(true))
///     .await?;
/// ```
pub struct BulkWriter<E: Execute> {
    executor: E,
    dialect: Arc<dyn Dialect>,
    compiler: Arc<dyn ExpressionCompiler>,
}

impl<E: Execute> std::fmt::Debug for BulkWriter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkWriter")
            .field("dialect", &self.dialect.name())
            .finish()
    }
}

impl<E: Execute> BulkWriter<E> {
    /// Creates a writer using the dialect installed by [`init`](crate::init).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no dialect has been installed.
    pub fn new(executor: E) -> Result<Self> {
        Ok(Self::with_dialect(executor, dialect::dialect()?))
    }

    /// Creates a writer with an explicit dialect.
    pub fn with_dialect(executor: E, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            executor,
            dialect,
            compiler: Arc::new(PgExpressionCompiler),
        }
    }

    /// Replaces the compiler used for computed update fields and record expressions.
    pub fn with_expression_compiler(mut self, compiler: Arc<dyn ExpressionCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn executor(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Inserts `records`, updating rows that collide on `unique_fields`.
    ///
    /// `update_fields = None` updates every eligible column; an empty slice
    /// turns the conflict arm into `DO NOTHING`. Auto-timestamp fields of
    /// `records` are set to the current time.
    ///
    /// Returns `None` when returning was not requested or the batch is
    /// empty; otherwise every returned row carries a created/updated status.
    ///
    /// # Errors
    ///
    /// Returns configuration errors before anything is executed, and
    /// backend errors (constraint violations, deadlocks) unchanged.
    #[instrument(skip_all, fields(table = %table.name(), record_count = records.len()))]
    pub async fn upsert<R: Record>(
        &mut self,
        table: &TableDescriptor,
        records: &mut [R],
        unique_fields: &[&str],
        update_fields: Option<&[UpdateField]>,
        options: &WriteOptions,
    ) -> Result<Option<Vec<ResultRow>>> {
        let statement = compile_upsert(
            self.dialect.as_ref(),
            self.compiler.as_ref(),
            table,
            records,
            unique_fields,
            update_fields,
            options,
        )?;
        self.run(statement, options).await
    }

    /// Updates rows matched to `records` by primary key.
    ///
    /// Returns `None` when returning was not requested, the batch is empty,
    /// or no field is left to update.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the table has no primary key or a
    /// field is unknown; backend errors are returned unchanged.
    #[instrument(skip_all, fields(table = %table.name(), record_count = records.len()))]
    pub async fn bulk_update<R: Record>(
        &mut self,
        table: &TableDescriptor,
        records: &[R],
        update_fields: Option<&[UpdateField]>,
        options: &WriteOptions,
    ) -> Result<Option<Vec<ResultRow>>> {
        let statement = compile_bulk_update(
            self.dialect.as_ref(),
            self.compiler.as_ref(),
            table,
            records,
            update_fields,
            options,
        )?;
        self.run(statement, options).await
    }

    /// Blocking form of [`BulkWriter::upsert`].
    ///
    /// Must not be called from within an async context.
    pub fn upsert_blocking<R: Record>(
        &mut self,
        handle: &Handle,
        table: &TableDescriptor,
        records: &mut [R],
        unique_fields: &[&str],
        update_fields: Option<&[UpdateField]>,
        options: &WriteOptions,
    ) -> Result<Option<Vec<ResultRow>>> {
        handle.block_on(self.upsert(table, records, unique_fields, update_fields, options))
    }

    /// Blocking form of [`BulkWriter::bulk_update`].
    ///
    /// Must not be called from within an async context.
    pub fn bulk_update_blocking<R: Record>(
        &mut self,
        handle: &Handle,
        table: &TableDescriptor,
        records: &[R],
        update_fields: Option<&[UpdateField]>,
        options: &WriteOptions,
    ) -> Result<Option<Vec<ResultRow>>> {
        handle.block_on(self.bulk_update(table, records, update_fields, options))
    }

    async fn run(
        &mut self,
        statement: Option<CompiledStatement>,
        options: &WriteOptions,
    ) -> Result<Option<Vec<ResultRow>>> {
        let Some(statement) = statement else {
            debug!("No statement to execute");
            return Ok(None);
        };

        let output = self.executor.execute(&statement).await?;
        info!(
            rows_affected = output.rows_affected,
            args = statement.args.len(),
            "Bulk write applied"
        );

        if !options.returning.is_requested() {
            return Ok(None);
        }
        check_returned_columns(&statement, &output.columns)?;
        materialize(&statement.output_columns, output.rows, statement.has_status).map(Some)
    }
}

/// Verifies the backend returned the columns the statement asked for, in order.
///
/// An empty `returned` list (no rows, or an executor that does not report
/// names) is accepted.
fn check_returned_columns(statement: &CompiledStatement, returned: &[String]) -> Result<()> {
    if returned.is_empty() {
        return Ok(());
    }

    let expected = statement
        .output_columns
        .iter()
        .map(String::as_str)
        .chain(statement.has_status.then_some(STATUS_COLUMN));
    if !expected.eq(returned.iter().map(String::as_str)) {
        return Err(BulkError::Internal(format!(
            "Returned columns {:?} do not match requested {:?}",
            returned, statement.output_columns
        )));
    }
    Ok(())
}
