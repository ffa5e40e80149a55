//! Tests for statement compilation.

use super::*;
use crate::dialect::PostgresDialect;
use crate::expression::{Expression, PgExpressionCompiler};
use crate::record::RowRecord;
use crate::schema::{ColumnDescriptor, ColumnType, TableDescriptor};
use crate::{BulkError, ExtractedValue};

fn users() -> TableDescriptor {
    TableDescriptor::new(
        "users",
        vec![
            ColumnDescriptor::new("id", ColumnType::BigInt).auto_increment(),
            ColumnDescriptor::new("email", ColumnType::Text),
            ColumnDescriptor::new("count", ColumnType::Integer),
        ],
    )
    .unwrap()
}

fn tasks() -> TableDescriptor {
    TableDescriptor::new(
        "tasks",
        vec![
            ColumnDescriptor::new("id", ColumnType::BigInt).primary_key(),
            ColumnDescriptor::new("status", ColumnType::Text),
            ColumnDescriptor::new("note", ColumnType::Text),
        ],
    )
    .unwrap()
}

fn user(email: &str, count: i32) -> RowRecord {
    RowRecord::new().with("email", email).with("count", count)
}

fn task(id: i64, status: &str) -> RowRecord {
    RowRecord::new().with("id", id).with("status", status)
}

fn upsert(
    table: &TableDescriptor,
    records: &mut [RowRecord],
    unique: &[&str],
    fields: Option<&[UpdateField]>,
    options: &WriteOptions,
) -> Result<Option<CompiledStatement>, BulkError> {
    compile_upsert(&PostgresDialect::new(), &PgExpressionCompiler, table, records, unique, fields, options)
}

fn bulk_update(
    table: &TableDescriptor,
    records: &[RowRecord],
    fields: Option<&[UpdateField]>,
    options: &WriteOptions,
) -> Result<Option<CompiledStatement>, BulkError> {
    compile_bulk_update(&PostgresDialect::new(), &PgExpressionCompiler, table, records, fields, options)
}

fn arg_values(statement: &CompiledStatement) -> Vec<ExtractedValue> {
    statement.args.iter().map(|a| a.value.clone()).collect()
}

#[test]
fn test_upsert_basic() {
    let mut records = vec![user("b@x.com", 5), user("a@x.com", 1)];
    let statement = upsert(&users(), &mut records, &["email"], None, &WriteOptions::new())
        .unwrap()
        .unwrap();

    assert_eq!(
        statement.sql,
        "INSERT INTO \"users\" (\"email\", \"count\") VALUES ($1::text, $2::integer), ($3, $4) \
         ON CONFLICT (\"email\") DO UPDATE SET \"count\" = EXCLUDED.\"count\""
    );
    assert_eq!(
        arg_values(&statement),
        vec![
            ExtractedValue::from("a@x.com"),
            ExtractedValue::Int(1),
            ExtractedValue::from("b@x.com"),
            ExtractedValue::Int(5),
        ]
    );
    assert!(!statement.has_status);
    assert!(statement.output_columns.is_empty());
}

#[test]
fn test_upsert_returning_and_skip_unchanged() {
    let mut records = vec![user("a@x.com", 1)];
    let options = WriteOptions::new().returning(true).skip_unchanged(true);
    let statement = upsert(&users(), &mut records, &["email"], None, &options)
        .unwrap()
        .unwrap();

    assert_eq!(
        statement.sql,
        "INSERT INTO \"users\" (\"email\", \"count\") VALUES ($1::text, $2::integer) \
         ON CONFLICT (\"email\") DO UPDATE SET \"count\" = EXCLUDED.\"count\" \
         WHERE ((\"users\".\"count\") IS DISTINCT FROM (EXCLUDED.\"count\")) \
         RETURNING \"users\".\"id\", \"users\".\"email\", \"users\".\"count\", \
         CASE WHEN xmax = 0 THEN 'created' ELSE 'updated' END AS status_"
    );
    assert!(statement.has_status);
    assert_eq!(statement.output_columns, vec!["id", "email", "count"]);
}

#[test]
fn test_upsert_empty_update_fields_do_nothing() {
    let mut records = vec![user("a@x.com", 1)];
    let statement = upsert(&users(), &mut records, &["email"], Some(&[][..]), &WriteOptions::new())
        .unwrap()
        .unwrap();

    assert!(statement.sql.ends_with("ON CONFLICT (\"email\") DO NOTHING"));
}

#[test]
fn test_upsert_unique_only_update_do_nothing() {
    // The unique field is never updated, which leaves nothing to set
    let mut records = vec![user("a@x.com", 1)];
    let fields = vec![UpdateField::column("email")];
    let statement = upsert(&users(), &mut records, &["email"], Some(fields.as_slice()), &WriteOptions::new())
        .unwrap()
        .unwrap();

    assert!(statement.sql.contains("DO NOTHING"));
}

#[test]
fn test_upsert_computed_increment() {
    let mut records = vec![user("a@x.com", 1)];
    let fields = vec![UpdateField::computed(
        "count",
        Expression::column("count").add(Expression::incoming("count")),
    )];
    let statement = upsert(&users(), &mut records, &["email"], Some(fields.as_slice()), &WriteOptions::new())
        .unwrap()
        .unwrap();

    assert!(statement
        .sql
        .ends_with("DO UPDATE SET \"count\" = (\"users\".\"count\" + EXCLUDED.\"count\")"));
}

#[test]
fn test_upsert_on_primary_key_inserts_key() {
    let mut records = vec![RowRecord::new().with("id", 7i64).with("email", "a@x.com")];
    let statement = upsert(&users(), &mut records, &["id"], None, &WriteOptions::new())
        .unwrap()
        .unwrap();

    assert!(statement
        .sql
        .starts_with("INSERT INTO \"users\" (\"id\", \"email\", \"count\") VALUES ($1::bigint, $2::text, $3::integer)"));
    assert!(statement
        .sql
        .ends_with("ON CONFLICT (\"id\") DO UPDATE SET \"email\" = EXCLUDED.\"email\", \"count\" = EXCLUDED.\"count\""));
    assert_eq!(statement.args[2].value, ExtractedValue::Null);
}

#[test]
fn test_upsert_fills_auto_timestamps() {
    let table = TableDescriptor::new(
        "events",
        vec![
            ColumnDescriptor::new("id", ColumnType::BigInt).auto_increment(),
            ColumnDescriptor::new("key", ColumnType::Text),
            ColumnDescriptor::new("created_at", ColumnType::TimestampTz).auto_now_add(),
            ColumnDescriptor::new("updated_at", ColumnType::TimestampTz).auto_now(),
        ],
    )
    .unwrap();
    let mut records = vec![
        RowRecord::new().with("key", "a"),
        RowRecord::new().with("key", "b"),
    ];

    let statement = upsert(&table, &mut records, &["key"], None, &WriteOptions::new())
        .unwrap()
        .unwrap();

    assert!(statement
        .sql
        .ends_with("DO UPDATE SET \"updated_at\" = EXCLUDED.\"updated_at\""));
    let stamps: Vec<&ExtractedValue> = statement
        .args
        .iter()
        .filter(|a| a.column_type == ColumnType::TimestampTz)
        .map(|a| &a.value)
        .collect();
    assert_eq!(stamps.len(), 4);
    assert!(matches!(stamps[0], ExtractedValue::TimestampTz(_)));
    assert!(stamps.iter().all(|s| *s == stamps[0]));
}

#[test]
fn test_upsert_exclude_option() {
    let mut records = vec![user("a@x.com", 1)];
    let options = WriteOptions::new().exclude(&["count"]);
    let statement = upsert(&users(), &mut records, &["email"], None, &options)
        .unwrap()
        .unwrap();
    assert!(statement.sql.ends_with("DO NOTHING"));
}

#[test]
fn test_upsert_empty_batch() {
    let mut records: Vec<RowRecord> = vec![];
    let options = WriteOptions::new().returning(true);
    assert!(upsert(&users(), &mut records, &["email"], None, &options)
        .unwrap()
        .is_none());
}

#[test]
fn test_upsert_configuration_errors() {
    let mut records: Vec<RowRecord> = vec![];
    let options = WriteOptions::new();

    assert!(matches!(
        upsert(&users(), &mut records, &[], None, &options),
        Err(BulkError::Configuration(_))
    ));
    assert!(matches!(
        upsert(&users(), &mut records, &["missing"], None, &options),
        Err(BulkError::Configuration(_))
    ));
    // Reported even for an empty batch
    let fields = vec![UpdateField::column("missing")];
    assert!(matches!(
        upsert(&users(), &mut records, &["email"], Some(fields.as_slice()), &options),
        Err(BulkError::Configuration(_))
    ));
    let options = WriteOptions::new().returning(Returning::columns(&["missing"]));
    assert!(matches!(
        upsert(&users(), &mut records, &["email"], None, &options),
        Err(BulkError::Configuration(_))
    ));
}

#[test]
fn test_upsert_parameter_limit() {
    let mut records: Vec<RowRecord> = (0..32768).map(|i| user(&format!("{}@x.com", i), i)).collect();
    let result = upsert(&users(), &mut records, &["email"], None, &WriteOptions::new());
    assert!(matches!(result, Err(BulkError::Configuration(_))));
}

#[test]
fn test_bulk_update_basic() {
    let records = vec![task(3, "done"), task(1, "open"), task(2, "open")];
    let fields = vec![UpdateField::column("status")];
    let options = WriteOptions::new().skip_unchanged(true);
    let statement = bulk_update(&tasks(), &records, Some(fields.as_slice()), &options)
        .unwrap()
        .unwrap();

    assert_eq!(
        statement.sql,
        "UPDATE \"tasks\" SET \"status\" = new_values.\"status\" \
         FROM (VALUES ($1::bigint, $2::text), ($3, $4), ($5, $6)) AS new_values (\"id\", \"status\") \
         WHERE \"tasks\".\"id\" = new_values.\"id\" \
         AND ((\"tasks\".\"status\") IS DISTINCT FROM (new_values.\"status\"))"
    );
    assert_eq!(
        arg_values(&statement),
        vec![
            ExtractedValue::BigInt(1),
            ExtractedValue::from("open"),
            ExtractedValue::BigInt(2),
            ExtractedValue::from("open"),
            ExtractedValue::BigInt(3),
            ExtractedValue::from("done"),
        ]
    );
    assert!(!statement.has_status);
}

#[test]
fn test_bulk_update_all_fields_and_returning() {
    let records = vec![task(1, "open")];
    let options = WriteOptions::new().returning(Returning::columns(&["id", "status"]));
    let statement = bulk_update(&tasks(), &records, None, &options).unwrap().unwrap();

    assert_eq!(
        statement.sql,
        "UPDATE \"tasks\" SET \"status\" = new_values.\"status\", \"note\" = new_values.\"note\" \
         FROM (VALUES ($1::bigint, $2::text, $3::text)) AS new_values (\"id\", \"status\", \"note\") \
         WHERE \"tasks\".\"id\" = new_values.\"id\" \
         RETURNING \"tasks\".\"id\", \"tasks\".\"status\""
    );
    assert_eq!(statement.output_columns, vec!["id", "status"]);
    assert!(!statement.has_status);
}

#[test]
fn test_bulk_update_computed_field() {
    let records = vec![task(1, "open")];
    let fields = vec![UpdateField::computed(
        "status",
        Expression::incoming("status").concat(Expression::value("!")),
    )];
    let statement = bulk_update(&tasks(), &records, Some(fields.as_slice()), &WriteOptions::new())
        .unwrap()
        .unwrap();

    assert!(statement
        .sql
        .starts_with("UPDATE \"tasks\" SET \"status\" = (new_values.\"status\" || '!') FROM"));
}

#[test]
fn test_bulk_update_nothing_to_do() {
    let options = WriteOptions::new().returning(true);
    assert!(bulk_update(&tasks(), &[], None, &options).unwrap().is_none());

    let records = vec![task(1, "open")];
    assert!(bulk_update(&tasks(), &records, Some(&[][..]), &options)
        .unwrap()
        .is_none());
    let fields = vec![UpdateField::column("id")];
    assert!(bulk_update(&tasks(), &records, Some(fields.as_slice()), &options)
        .unwrap()
        .is_none());
}

#[test]
fn test_bulk_update_requires_primary_key() {
    let table = TableDescriptor::new(
        "log",
        vec![ColumnDescriptor::new("line", ColumnType::Text)],
    )
    .unwrap();
    let records = vec![RowRecord::new().with("line", "x")];
    let err = bulk_update(&table, &records, None, &WriteOptions::new()).unwrap_err();
    assert!(matches!(err, BulkError::Configuration(_)));
}

#[test]
fn test_placeholder_parity() {
    let mut users_batch = vec![
        user("a@x.com", 1),
        RowRecord::new()
            .with("email", "b@x.com")
            .with_expression("count", Expression::value(2i32).add(3i32)),
        user("c@x.com", 3),
    ];
    let upserted = upsert(&users(), &mut users_batch, &["email"], None, &WriteOptions::new().returning(true))
        .unwrap()
        .unwrap();
    assert_eq!(upserted.placeholder_count(), upserted.args.len());
    assert_eq!(upserted.args.len(), 5);

    let tasks_batch = vec![task(1, "a"), task(2, "it's $1")];
    let updated = bulk_update(&tasks(), &tasks_batch, None, &WriteOptions::new().skip_unchanged(true))
        .unwrap()
        .unwrap();
    assert_eq!(updated.placeholder_count(), updated.args.len());
}
