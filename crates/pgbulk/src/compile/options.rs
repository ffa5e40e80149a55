//! Per-call write options.

use serde::{Deserialize, Serialize};

/// Which columns a write returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Returning {
    /// No RETURNING clause; the call yields `None`
    #[default]
    Nothing,
    /// Every concrete, non-generated column
    All,
    /// The named fields, by logical or storage name
    Columns(Vec<String>),
}

impl Returning {
    pub fn columns(names: &[&str]) -> Self {
        Returning::Columns(names.iter().map(|n| n.to_string()).collect())
    }

    /// An empty column list requests nothing.
    pub fn is_requested(&self) -> bool {
        match self {
            Returning::Nothing => false,
            Returning::All => true,
            Returning::Columns(names) => !names.is_empty(),
        }
    }
}

impl From<bool> for Returning {
    fn from(all: bool) -> Self {
        if all {
            Returning::All
        } else {
            Returning::Nothing
        }
    }
}

/// Options shared by upsert and bulk update.
///
/// # Example
///
/// ```rust
/// use pgbulk::{Returning, WriteOptions};
///
/// let options = WriteOptions::new()
///     .exclude(&["updated_at"])
///     .returning(Returning::All)
///     .skip_unchanged(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Fields never updated, by logical or storage name
    pub exclude: Vec<String>,
    pub returning: Returning,
    /// Skip rows whose stored values already equal the new values
    pub skip_unchanged: bool,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(mut self, fields: &[&str]) -> Self {
        self.exclude.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn returning(mut self, returning: impl Into<Returning>) -> Self {
        self.returning = returning.into();
        self
    }

    pub fn skip_unchanged(mut self, enabled: bool) -> Self {
        self.skip_unchanged = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returning_requested() {
        assert!(!Returning::Nothing.is_requested());
        assert!(Returning::All.is_requested());
        assert!(Returning::columns(&["id"]).is_requested());
        assert!(!Returning::Columns(vec![]).is_requested());
        assert_eq!(Returning::from(true), Returning::All);
        assert_eq!(Returning::from(false), Returning::Nothing);
    }

    #[test]
    fn test_options_builder() {
        let options = WriteOptions::new()
            .exclude(&["a"])
            .exclude(&["b"])
            .returning(true)
            .skip_unchanged(true);

        assert_eq!(options.exclude, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(options.returning, Returning::All);
        assert!(options.skip_unchanged);
        assert_eq!(WriteOptions::default().returning, Returning::Nothing);
    }
}
