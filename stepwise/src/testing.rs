//! Testing utilities for developing migration trees

#[cfg(feature = "sqlite")]
pub mod sqlite;
