//! The cursor interface shared by every executable plan.

use super::Constant;
use crate::error::Error;

/// A forward cursor over the rows produced by a plan.
///
/// A freshly opened scan is positioned before its first row. Resources a
/// scan holds (temporary tables, pinned blocks) are released when it is
/// dropped.
pub trait Scan {
    /// Reposition before the first row.
    fn before_first(&mut self) -> Result<(), Error>;

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    fn next(&mut self) -> Result<bool, Error>;

    /// Value of a field in the current row.
    fn get_val(&self, field: &str) -> Result<Constant, Error>;

    /// Whether the scan's rows carry this field.
    fn has_field(&self, field: &str) -> bool;

    /// Integer value of a field in the current row.
    fn get_int(&self, field: &str) -> Result<i32, Error> {
        match self.get_val(field)? {
            Constant::Int(n) => Ok(n),
            Constant::Str(_) => Err(Error::TypeMismatch {
                field: field.to_string(),
                expected: "int".into(),
            }),
        }
    }

    /// String value of a field in the current row.
    fn get_string(&self, field: &str) -> Result<String, Error> {
        match self.get_val(field)? {
            Constant::Str(s) => Ok(s),
            Constant::Int(_) => Err(Error::TypeMismatch {
                field: field.to_string(),
                expected: "varchar".into(),
            }),
        }
    }
}

impl<S: Scan + ?Sized> Scan for Box<S> {
    fn before_first(&mut self) -> Result<(), Error> {
        (**self).before_first()
    }

    fn next(&mut self) -> Result<bool, Error> {
        (**self).next()
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        (**self).get_val(field)
    }

    fn has_field(&self, field: &str) -> bool {
        (**self).has_field(field)
    }
}

/// A scan over rows already held in memory.
///
/// Used for the outer chunk of the chunked loop joins and in tests.
#[derive(Debug, Clone)]
pub struct RowBuffer {
    fields: Vec<String>,
    rows: Vec<Vec<Constant>>,
    current: Option<usize>,
}

impl RowBuffer {
    /// Create an empty buffer for the given field names.
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
            current: None,
        }
    }

    /// Append a row; values are in field order.
    pub fn push(&mut self, row: Vec<Constant>) {
        self.rows.push(row);
    }

    /// Copy the current row of `scan` into the buffer.
    pub fn push_from(&mut self, scan: &dyn Scan) -> Result<(), Error> {
        let row = self
            .fields
            .iter()
            .map(|f| scan.get_val(f))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.push(row);
        Ok(())
    }

    /// Remove all rows.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.current = None;
    }

    /// Number of buffered rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the buffer holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Scan for RowBuffer {
    fn before_first(&mut self) -> Result<(), Error> {
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool, Error> {
        let next = self.current.map_or(0, |i| i + 1);
        if next < self.rows.len() {
            self.current = Some(next);
            Ok(true)
        } else {
            self.current = Some(self.rows.len());
            Ok(false)
        }
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        let pos = self
            .fields
            .iter()
            .position(|f| f == field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))?;
        self.current
            .and_then(|i| self.rows.get(i))
            .map(|row| row[pos].clone())
            .ok_or_else(|| Error::InvalidData("scan is not positioned on a row".into()))
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}
