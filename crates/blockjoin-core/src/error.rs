//! Core error types.

use thiserror::Error;

/// Core planner and storage errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Two inputs of a join share a field name.
    #[error("schema conflict: field '{field}' appears on both sides of a join")]
    SchemaConflict { field: String },

    /// Table is not registered in the catalog.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// Field is not part of the schema being accessed.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Table name is already taken.
    #[error("table already exists: {0}")]
    DuplicateTable(String),

    /// Index name is already taken.
    #[error("index already exists: {0}")]
    DuplicateIndex(String),

    /// Value does not match the declared field type.
    #[error("type mismatch on field '{field}': expected {expected}")]
    TypeMismatch { field: String, expected: String },

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
