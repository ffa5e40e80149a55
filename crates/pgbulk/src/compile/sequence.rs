//! Deterministic row ordering.
//!
//! Concurrent writers that lock the same rows in different orders deadlock.
//! Sorting every batch by its key imposes one order on all of them; rows
//! outside the batch can still interleave.

use std::cmp::Ordering;

use crate::record::{FieldValue, Record};
use crate::schema::ColumnDescriptor;
use crate::{ExtractedValue, Result};

/// Storage value of a record's field, as used for ordering and comparison.
///
/// Missing fields and expressions order as NULL.
pub(crate) fn storage_key<R: Record>(record: &R, column: &ColumnDescriptor) -> Result<ExtractedValue> {
    match record.value(&column.name) {
        Some(FieldValue::Value(value)) => column.to_storage(&value),
        Some(FieldValue::Expression(_)) | None => Ok(ExtractedValue::Null),
    }
}

fn compare_keys(a: &[ExtractedValue], b: &[ExtractedValue]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.storage_cmp(y))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Orders records ascending by the tuple of their key columns' storage values.
///
/// The sort is stable: records with equal keys keep their input order.
pub fn sequence<'r, R: Record>(records: &'r [R], key_columns: &[&ColumnDescriptor]) -> Result<Vec<&'r R>> {
    let mut keyed: Vec<(Vec<ExtractedValue>, &'r R)> = records
        .iter()
        .map(|record| {
            let key = key_columns
                .iter()
                .map(|column| storage_key(record, column))
                .collect::<Result<Vec<_>>>()?;
            Ok((key, record))
        })
        .collect::<Result<_>>()?;

    keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b));
    Ok(keyed.into_iter().map(|(_, record)| record).collect())
}
