//! Common utilities for pgbulk
//!
//! This crate provides the error taxonomy shared by the bulk write engine
//! and its execution layer.

pub mod error;

pub use error::{classify_sqlstate, BulkError, Result};
