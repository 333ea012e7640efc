//! Field definitions for table schemas.

use super::types::FieldType;
use rkyv::{Archive, Deserialize, Serialize};

/// A named, typed field of a table.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
}

impl FieldDef {
    /// Create a new field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Create an integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    /// Create a string field with the given maximum length.
    pub fn varchar(name: impl Into<String>, len: u16) -> Self {
        Self::new(name, FieldType::Varchar(len))
    }
}
