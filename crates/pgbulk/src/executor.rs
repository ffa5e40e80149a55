//! Statement execution against PostgreSQL.
//!
//! [`Execute`] is the seam between the compilers and the driver: it runs one
//! compiled statement and hands back decoded rows. [`PgExecutor`] runs on a
//! pooled connection, [`TransactionExecutor`] inside a caller-owned
//! transaction. Neither retries; deadlocks and serialization failures are
//! surfaced to the caller (see [`BulkError::is_retryable`]).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnection, PgQueryResult, PgRow};
use sqlx::Postgres;
use tracing::{debug, info, warn};

use crate::compile::CompiledStatement;
use crate::connection::Connection;
use crate::types::{row_column_names, row_values};
use crate::{BulkError, ExtractedValue, Result};

/// Rows and row count produced by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Names of the returned columns; empty when nothing was returned
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ExtractedValue>>,
    pub rows_affected: u64,
}

/// Runs compiled statements.
#[async_trait]
pub trait Execute: Send {
    /// Executes `statement` in one round trip.
    ///
    /// Statements with output columns return their rows; others only report
    /// the affected row count.
    async fn execute(&mut self, statement: &CompiledStatement) -> Result<QueryOutput>;
}

/// Execution settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Statements slower than this are logged at warn level
    pub slow_query_threshold_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 1000, // 1 second
        }
    }
}

impl ExecutorConfig {
    pub fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold_ms = threshold.as_millis() as u64;
        self
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed.as_millis() as u64 >= self.slow_query_threshold_ms
    }
}

/// Executes each statement on a connection acquired from the pool.
///
/// The connection goes back to the pool when the call returns, on success
/// and on error alike.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    connection: Connection,
    config: ExecutorConfig,
}

impl PgExecutor {
    pub fn new(connection: Connection) -> Self {
        Self::with_config(connection, ExecutorConfig::default())
    }

    pub fn with_config(connection: Connection, config: ExecutorConfig) -> Self {
        Self { connection, config }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[async_trait]
impl Execute for PgExecutor {
    async fn execute(&mut self, statement: &CompiledStatement) -> Result<QueryOutput> {
        let mut conn = self.connection.pool().acquire().await?;
        run(&mut conn, statement, &self.config).await
    }
}

/// Executes statements inside an open sqlx transaction.
///
/// The caller commits or rolls back; a failed statement leaves the
/// transaction aborted.
///
/// ```ignore
/// let mut tx = connection.pool().begin().await?;
/// let mut writer = BulkWriter::new(TransactionExecutor::new(&mut tx))?;
/// writer.upsert(&users, &mut records, &["email"], None, &WriteOptions::new()).await?;
/// drop(writer);
/// tx.commit().await?;
/// ```
pub struct TransactionExecutor<'t, 'c> {
    tx: &'t mut sqlx::Transaction<'c, Postgres>,
    config: ExecutorConfig,
}

impl<'t, 'c> TransactionExecutor<'t, 'c> {
    pub fn new(tx: &'t mut sqlx::Transaction<'c, Postgres>) -> Self {
        Self::with_config(tx, ExecutorConfig::default())
    }

    pub fn with_config(tx: &'t mut sqlx::Transaction<'c, Postgres>, config: ExecutorConfig) -> Self {
        Self { tx, config }
    }
}

#[async_trait]
impl Execute for TransactionExecutor<'_, '_> {
    async fn execute(&mut self, statement: &CompiledStatement) -> Result<QueryOutput> {
        run(&mut **self.tx, statement, &self.config).await
    }
}

fn bind_arguments(statement: &CompiledStatement) -> Result<PgArguments> {
    let mut arguments = PgArguments::default();
    for arg in &statement.args {
        arg.bind(&mut arguments)?;
    }
    Ok(arguments)
}

enum Outcome {
    Rows(Vec<PgRow>),
    Done(PgQueryResult),
}

async fn run(
    conn: &mut PgConnection,
    statement: &CompiledStatement,
    config: &ExecutorConfig,
) -> Result<QueryOutput> {
    let arguments = bind_arguments(statement)?;
    let returns_rows = !statement.output_columns.is_empty();

    debug!(
        sql = %statement.preview(),
        args = statement.args.len(),
        returns_rows,
        "Executing bulk statement"
    );

    let start = Instant::now();
    let query = sqlx::query_with(&statement.sql, arguments);
    let outcome = if returns_rows {
        query.fetch_all(&mut *conn).await.map(Outcome::Rows)
    } else {
        query.execute(&mut *conn).await.map(Outcome::Done)
    };
    let elapsed = start.elapsed();

    let output = match outcome {
        Ok(Outcome::Rows(rows)) => QueryOutput {
            columns: rows.first().map(row_column_names).unwrap_or_default(),
            rows_affected: rows.len() as u64,
            rows: rows.iter().map(row_values).collect::<Result<_>>()?,
        },
        Ok(Outcome::Done(result)) => QueryOutput {
            rows_affected: result.rows_affected(),
            ..QueryOutput::default()
        },
        Err(e) => {
            let error = BulkError::from(e);
            warn!(
                sql = %statement.preview(),
                elapsed_ms = elapsed.as_millis() as u64,
                retryable = error.is_retryable(),
                error = %error,
                "Bulk statement failed"
            );
            return Err(error);
        }
    };

    log_completion(statement, elapsed, output.rows_affected, config);
    Ok(output)
}

fn log_completion(
    statement: &CompiledStatement,
    elapsed: Duration,
    rows_affected: u64,
    config: &ExecutorConfig,
) {
    let elapsed_ms = elapsed.as_millis() as u64;
    if config.is_slow(elapsed) {
        warn!(
            sql = %statement.preview(),
            elapsed_ms,
            threshold_ms = config.slow_query_threshold_ms,
            rows_affected,
            "Slow bulk statement"
        );
    } else {
        info!(elapsed_ms, rows_affected, "Bulk statement completed");
    }
}
