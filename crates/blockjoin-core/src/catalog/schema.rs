//! Table and plan schemas.

use super::{FieldDef, FieldType};
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};

/// The set of fields a table or plan produces.
///
/// Field order follows insertion order; lookups are by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.add_field(field);
        self
    }

    /// Add a field. A field that is already present keeps its original type.
    pub fn add_field(&mut self, field: FieldDef) {
        if !self.has_field(&field.name) {
            self.fields.push(field);
        }
    }

    /// Add an integer field.
    pub fn add_int_field(&mut self, name: impl Into<String>) {
        self.add_field(FieldDef::int(name));
    }

    /// Add a string field.
    pub fn add_string_field(&mut self, name: impl Into<String>, len: u16) {
        self.add_field(FieldDef::varchar(name, len));
    }

    /// Add every field of another schema.
    pub fn add_all(&mut self, other: &Schema) {
        for field in &other.fields {
            self.add_field(field.clone());
        }
    }

    /// Check whether the schema contains a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Get the type of a field.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.field_type)
    }

    /// Iterate over field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Field definitions in order.
    pub fn field_defs(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Position of a field within the schema.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build the output schema of a join.
    ///
    /// The two inputs must be disjoint; a shared field name is a
    /// `SchemaConflict`.
    pub fn join(lhs: &Schema, rhs: &Schema) -> Result<Schema, Error> {
        if let Some(shared) = lhs.fields().find(|name| rhs.has_field(name)) {
            return Err(Error::SchemaConflict {
                field: shared.to_string(),
            });
        }
        let mut schema = lhs.clone();
        schema.add_all(rhs);
        Ok(schema)
    }

    /// Restrict the schema to the named fields, in the given order.
    pub fn project(&self, names: &[String]) -> Result<Schema, Error> {
        let mut schema = Schema::new();
        for name in names {
            let field_type = self
                .field_type(name)
                .ok_or_else(|| Error::UnknownField(name.clone()))?;
            schema.add_field(FieldDef::new(name.clone(), field_type));
        }
        Ok(schema)
    }
}
