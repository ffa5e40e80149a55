//! Multi-row VALUES encoding.
//!
//! The first group casts every placeholder to its column type so the VALUES
//! constructor gets the right column types even when later rows are all NULL.
//! Expression-valued fields are inlined and consume no argument.

use crate::compile::statement::SqlArg;
use crate::dialect::Dialect;
use crate::expression::{CompileContext, ExpressionCompiler};
use crate::record::{FieldValue, Record};
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::{ExtractedValue, Result};

/// Rendered VALUES groups and the arguments they reference.
#[derive(Debug, Default)]
pub(crate) struct RowValues {
    pub groups: Vec<String>,
    pub args: Vec<SqlArg>,
}

impl RowValues {
    pub fn sql(&self) -> String {
        self.groups.join(", ")
    }
}

struct EncodedColumn<'t> {
    column: &'t ColumnDescriptor,
    cast: String,
    named_type: Option<&'static str>,
}

/// Encodes `records` (already sequenced) over `columns`.
///
/// Placeholders are numbered from `$1`.
pub(crate) fn extract_rows<R: Record>(
    dialect: &dyn Dialect,
    compiler: &dyn ExpressionCompiler,
    table: &TableDescriptor,
    records: &[&R],
    columns: &[&ColumnDescriptor],
) -> Result<RowValues> {
    let encoded = columns
        .iter()
        .map(|column| {
            Ok(EncodedColumn {
                column,
                cast: column.column_type.cast_sql(dialect)?,
                named_type: column.column_type.named_wire_type(dialect)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let context = CompileContext::row_value(dialect, table);
    let mut values = RowValues {
        groups: Vec::with_capacity(records.len()),
        args: Vec::with_capacity(records.len() * columns.len()),
    };

    for (row, record) in records.iter().enumerate() {
        let mut parts = Vec::with_capacity(encoded.len());

        for enc in &encoded {
            let typed = row == 0;
            match record.value(&enc.column.name) {
                Some(FieldValue::Expression(expression)) => {
                    let fragment = compiler.compile(&expression, &context)?;
                    parts.push(if typed {
                        format!("({})::{}", fragment.as_str(), enc.cast)
                    } else {
                        fragment.into_string()
                    });
                }
                value => {
                    let storage = match value {
                        Some(FieldValue::Value(v)) => enc.column.to_storage(&v)?,
                        _ => ExtractedValue::Null,
                    };
                    values.args.push(SqlArg {
                        value: storage,
                        column_type: enc.column.column_type.clone(),
                        named_type: enc.named_type,
                    });
                    let n = values.args.len();
                    parts.push(if typed {
                        format!("${}::{}", n, enc.cast)
                    } else {
                        format!("${}", n)
                    });
                }
            }
        }

        values.groups.push(format!("({})", parts.join(", ")));
    }

    Ok(values)
}
