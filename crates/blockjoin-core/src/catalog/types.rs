//! Field type definitions for the catalog.

use rkyv::{Archive, Deserialize, Serialize};

/// Bytes used to store an integer field.
pub const INT_BYTES: usize = 4;

/// Data types a table field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum FieldType {
    /// 32-bit signed integer.
    Int,
    /// Variable-length string with a declared maximum number of characters.
    Varchar(u16),
}

impl FieldType {
    /// Number of bytes the field occupies in a record slot.
    ///
    /// Strings carry a 4-byte length prefix ahead of the characters.
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => INT_BYTES,
            FieldType::Varchar(n) => INT_BYTES + *n as usize,
        }
    }

    /// Human-readable type name.
    pub fn name(&self) -> String {
        match self {
            FieldType::Int => "int".to_string(),
            FieldType::Varchar(n) => format!("varchar({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_len() {
        assert_eq!(FieldType::Int.byte_len(), 4);
        assert_eq!(FieldType::Varchar(40).byte_len(), 44);
    }

    #[test]
    fn test_name() {
        assert_eq!(FieldType::Int.name(), "int");
        assert_eq!(FieldType::Varchar(5).name(), "varchar(5)");
    }
}
