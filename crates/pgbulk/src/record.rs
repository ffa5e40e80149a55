//! Records: the caller's rows, addressed by logical field name.

use chrono::{DateTime, Utc};

use crate::expression::Expression;
use crate::schema::{ColumnType, TableDescriptor};
use crate::ExtractedValue;

/// Value of one field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain value, bound as a parameter after storage conversion
    Value(ExtractedValue),
    /// Server-side expression, inlined into the VALUES group
    Expression(Expression),
}

impl From<ExtractedValue> for FieldValue {
    fn from(value: ExtractedValue) -> Self {
        FieldValue::Value(value)
    }
}

impl From<Expression> for FieldValue {
    fn from(expression: Expression) -> Self {
        FieldValue::Expression(expression)
    }
}

/// A row supplied by the caller.
///
/// `value` returns `None` for fields the record does not carry; those are
/// written as NULL. `set_value` is only used to fill auto-timestamp fields.
pub trait Record {
    fn value(&self, field: &str) -> Option<FieldValue>;

    fn set_value(&mut self, field: &str, value: ExtractedValue);
}

/// Ordered field/value pairs for callers without a typed row struct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    fields: Vec<(String, FieldValue)>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RowRecord::set`].
    pub fn with(mut self, field: &str, value: impl Into<ExtractedValue>) -> Self {
        self.set(field, FieldValue::Value(value.into()));
        self
    }

    /// Sets a field to a server-side expression.
    pub fn with_expression(mut self, field: &str, expression: Expression) -> Self {
        self.set(field, FieldValue::Expression(expression));
        self
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Record for RowRecord {
    fn value(&self, field: &str) -> Option<FieldValue> {
        self.get(field).cloned()
    }

    fn set_value(&mut self, field: &str, value: ExtractedValue) {
        self.set(field, value);
    }
}

/// Sets every `auto_now`/`auto_now_add` field of every record to `now`.
///
/// All records of one call share the same timestamp. Returns the number of
/// fields filled per record.
pub fn fill_auto_fields<R: Record>(table: &TableDescriptor, records: &mut [R], now: DateTime<Utc>) -> usize {
    let auto_fields: Vec<(&str, ExtractedValue)> = table
        .concrete_columns()
        .filter(|c| c.flags.auto_now || c.flags.auto_now_add)
        .map(|c| (c.name.as_str(), timestamp_for(&c.column_type, now)))
        .collect();

    for record in records.iter_mut() {
        for (field, value) in &auto_fields {
            record.set_value(field, value.clone());
        }
    }

    auto_fields.len()
}

fn timestamp_for(column_type: &ColumnType, now: DateTime<Utc>) -> ExtractedValue {
    match column_type {
        ColumnType::Timestamp => ExtractedValue::Timestamp(now.naive_utc()),
        ColumnType::Date => ExtractedValue::Date(now.date_naive()),
        ColumnType::Time => ExtractedValue::Time(now.time()),
        _ => ExtractedValue::TimestampTz(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDescriptor;
    use chrono::TimeZone;

    #[test]
    fn test_row_record_set_replaces() {
        let mut record = RowRecord::new().with("a", 1i32).with("b", "x");
        record.set("a", ExtractedValue::Int(2));

        assert_eq!(record.value("a"), Some(FieldValue::Value(ExtractedValue::Int(2))));
        assert_eq!(record.value("missing"), None);
        let names: Vec<&str> = record.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_row_record_expression() {
        let record = RowRecord::new().with_expression("n", Expression::Now);
        assert!(matches!(record.value("n"), Some(FieldValue::Expression(Expression::Now))));
    }

    #[test]
    fn test_fill_auto_fields_shares_timestamp() {
        let table = TableDescriptor::new(
            "events",
            vec![
                ColumnDescriptor::new("id", ColumnType::BigInt).auto_increment(),
                ColumnDescriptor::new("created", ColumnType::TimestampTz).auto_now_add(),
                ColumnDescriptor::new("updated", ColumnType::Timestamp).auto_now(),
                ColumnDescriptor::new("day", ColumnType::Date),
            ],
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut records = vec![RowRecord::new(), RowRecord::new().with("created", "stale")];

        assert_eq!(fill_auto_fields(&table, &mut records, now), 2);

        for record in &records {
            assert_eq!(
                record.value("created"),
                Some(FieldValue::Value(ExtractedValue::TimestampTz(now)))
            );
            assert_eq!(
                record.value("updated"),
                Some(FieldValue::Value(ExtractedValue::Timestamp(now.naive_utc())))
            );
            assert_eq!(record.value("day"), None);
        }
    }
}
