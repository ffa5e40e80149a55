//! Field selection for inserts and updates.

use crate::expression::Expression;
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::{BulkError, Result};

/// A field to update: a plain column, or a column set from an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateField {
    Column(String),
    Computed { name: String, expression: Expression },
}

impl UpdateField {
    pub fn column(name: &str) -> Self {
        UpdateField::Column(name.to_string())
    }

    pub fn computed(name: &str, expression: Expression) -> Self {
        UpdateField::Computed {
            name: name.to_string(),
            expression,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UpdateField::Column(name) | UpdateField::Computed { name, .. } => name,
        }
    }

    pub fn expression(&self) -> Option<&Expression> {
        match self {
            UpdateField::Column(_) => None,
            UpdateField::Computed { expression, .. } => Some(expression),
        }
    }
}

impl From<&str> for UpdateField {
    fn from(name: &str) -> Self {
        UpdateField::column(name)
    }
}

/// A column selected for update.
#[derive(Debug, Clone)]
pub struct UpdateTarget<'t> {
    pub column: &'t ColumnDescriptor,
    pub expression: Option<Expression>,
}

fn is_excluded(column: &ColumnDescriptor, exclude: &[String]) -> bool {
    exclude.iter().any(|name| column.answers_to(name))
}

/// Selects the columns an update may assign.
///
/// `requested = None` means every concrete column. Primary keys, generated
/// columns, `auto_now_add` columns and excluded fields are always dropped,
/// even when requested.
///
/// # Errors
///
/// Returns a configuration error if a requested field is unknown or is
/// requested more than once, under either its logical or storage name.
pub fn select_update_fields<'t>(
    table: &'t TableDescriptor,
    requested: Option<&[UpdateField]>,
    exclude: &[String],
) -> Result<Vec<UpdateTarget<'t>>> {
    let candidates: Vec<UpdateTarget<'t>> = match requested {
        None => table
            .concrete_columns()
            .map(|column| UpdateTarget {
                column,
                expression: None,
            })
            .collect(),
        Some(fields) => fields
            .iter()
            .map(|field| {
                Ok(UpdateTarget {
                    column: table.require_field(field.name())?,
                    expression: field.expression().cloned(),
                })
            })
            .collect::<Result<_>>()?,
    };

    let mut selected: Vec<UpdateTarget<'t>> = Vec::with_capacity(candidates.len());
    for target in candidates {
        let column = target.column;
        let eligible = column.is_writable()
            && !column.flags.primary_key
            && !column.flags.auto_now_add
            && !is_excluded(column, exclude);
        if !eligible {
            continue;
        }
        if selected.iter().any(|t| t.column.column == column.column) {
            return Err(BulkError::Configuration(format!(
                "Duplicate update field '{}'",
                column.name
            )));
        }
        selected.push(target);
    }

    Ok(selected)
}

/// Selects the columns an upsert inserts.
///
/// Every writable column, except database-assigned keys that are not part of
/// the conflict target.
pub fn select_insert_columns<'t>(
    table: &'t TableDescriptor,
    unique: &[&ColumnDescriptor],
) -> Vec<&'t ColumnDescriptor> {
    table
        .concrete_columns()
        .filter(|column| {
            !column.flags.auto_increment || unique.iter().any(|u| u.column == column.column)
        })
        .collect()
}
