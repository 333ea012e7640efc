//! Chunked nested loop shared by the multibuffer product and the
//! block nested loop join.
//!
//! The outer cursor is read a chunk at a time into memory; for each chunk
//! the inner cursor is scanned once and every inner row is paired with
//! every row of the chunk.

use crate::catalog::Schema;
use crate::error::Error;
use crate::query::{Constant, Predicate, RowBuffer, Scan};

pub struct ChunkedLoopScan {
    outer: Box<dyn Scan>,
    inner: Box<dyn Scan>,
    chunk: RowBuffer,
    chunk_rows: usize,
    pred: Option<Predicate>,
    outer_done: bool,
    loaded: bool,
}

impl ChunkedLoopScan {
    pub fn new(
        outer: Box<dyn Scan>,
        outer_schema: &Schema,
        inner: Box<dyn Scan>,
        chunk_rows: usize,
        pred: Option<Predicate>,
    ) -> Self {
        let fields = outer_schema.fields().map(String::from).collect();
        Self {
            outer,
            inner,
            chunk: RowBuffer::new(fields),
            chunk_rows: chunk_rows.max(1),
            pred,
            outer_done: false,
            loaded: false,
        }
    }

    fn load_chunk(&mut self) -> Result<bool, Error> {
        self.chunk.clear();
        while !self.outer_done && self.chunk.len() < self.chunk_rows {
            if self.outer.next()? {
                self.chunk.push_from(self.outer.as_ref())?;
            } else {
                self.outer_done = true;
            }
        }
        Ok(!self.chunk.is_empty())
    }

    fn matches(&self) -> Result<bool, Error> {
        match &self.pred {
            Some(pred) => pred.is_satisfied(self),
            None => Ok(true),
        }
    }
}

impl Scan for ChunkedLoopScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.outer.before_first()?;
        self.chunk.clear();
        self.outer_done = false;
        self.loaded = false;
        Ok(())
    }

    fn next(&mut self) -> Result<bool, Error> {
        loop {
            if !self.loaded {
                if !self.load_chunk()? {
                    return Ok(false);
                }
                self.inner.before_first()?;
                if !self.inner.next()? {
                    // Empty inner side: no chunk can produce rows.
                    self.outer_done = true;
                    self.chunk.clear();
                    return Ok(false);
                }
                self.chunk.before_first()?;
                self.loaded = true;
            }

            if self.chunk.next()? {
                if self.matches()? {
                    return Ok(true);
                }
                continue;
            }

            if self.inner.next()? {
                self.chunk.before_first()?;
            } else {
                self.loaded = false;
            }
        }
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        if self.chunk.has_field(field) {
            self.chunk.get_val(field)
        } else {
            self.inner.get_val(field)
        }
    }

    fn has_field(&self, field: &str) -> bool {
        self.chunk.has_field(field) || self.inner.has_field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;
    use crate::query::{Expression, Term};

    fn buffer(field: &str, values: &[i32]) -> RowBuffer {
        let mut buf = RowBuffer::new(vec![field.to_string()]);
        for v in values {
            buf.push(vec![Constant::Int(*v)]);
        }
        buf
    }

    fn collect(scan: &mut ChunkedLoopScan) -> Vec<(i32, i32)> {
        let mut rows = Vec::new();
        scan.before_first().unwrap();
        while scan.next().unwrap() {
            rows.push((scan.get_int("a").unwrap(), scan.get_int("b").unwrap()));
        }
        rows.sort();
        rows
    }

    #[test]
    fn test_product_across_chunks() {
        let schema = Schema::new().with_field(FieldDef::int("a"));
        for chunk_rows in [1, 2, 5, 100] {
            let mut scan = ChunkedLoopScan::new(
                Box::new(buffer("a", &[1, 2, 3, 4, 5])),
                &schema,
                Box::new(buffer("b", &[10, 20])),
                chunk_rows,
                None,
            );
            let rows = collect(&mut scan);
            assert_eq!(rows.len(), 10, "chunk size {}", chunk_rows);
            assert_eq!(rows[0], (1, 10));
            assert_eq!(rows[9], (5, 20));
        }
    }

    #[test]
    fn test_predicate_filters() {
        let schema = Schema::new().with_field(FieldDef::int("a"));
        let pred = Predicate::from_term(Term::less_than(
            Expression::field("a"),
            Expression::field("b"),
        ));
        let mut scan = ChunkedLoopScan::new(
            Box::new(buffer("a", &[1, 2, 3])),
            &schema,
            Box::new(buffer("b", &[2, 3])),
            2,
            Some(pred),
        );
        assert_eq!(collect(&mut scan), vec![(1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_empty_sides() {
        let schema = Schema::new().with_field(FieldDef::int("a"));
        let mut scan = ChunkedLoopScan::new(
            Box::new(buffer("a", &[1, 2])),
            &schema,
            Box::new(buffer("b", &[])),
            1,
            None,
        );
        assert!(collect(&mut scan).is_empty());

        let mut scan = ChunkedLoopScan::new(
            Box::new(buffer("a", &[])),
            &schema,
            Box::new(buffer("b", &[1])),
            1,
            None,
        );
        assert!(collect(&mut scan).is_empty());
    }
}
