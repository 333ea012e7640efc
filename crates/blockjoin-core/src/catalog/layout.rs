//! Record slot layout used for block-count estimates.

use super::Schema;

/// Bytes reserved at the start of each slot for the in-use flag.
const SLOT_FLAG_BYTES: usize = 4;

/// Physical sizing of a schema's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    slot_size: usize,
    block_size: usize,
}

impl Layout {
    /// Compute the layout of a schema for the given block size.
    pub fn new(schema: &Schema, block_size: usize) -> Self {
        let slot_size = SLOT_FLAG_BYTES
            + schema
                .field_defs()
                .iter()
                .map(|f| f.field_type.byte_len())
                .sum::<usize>();
        Self {
            slot_size,
            block_size,
        }
    }

    /// Layout for an explicit slot size.
    pub fn with_slot_size(slot_size: usize, block_size: usize) -> Self {
        Self {
            slot_size: slot_size.max(1),
            block_size,
        }
    }

    /// Size of one record slot in bytes.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Block size the layout was computed for.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of records that fit in one block (at least one).
    pub fn records_per_block(&self) -> u64 {
        ((self.block_size / self.slot_size) as u64).max(1)
    }

    /// Number of blocks needed to hold `records` records.
    pub fn blocks_for(&self, records: u64) -> u64 {
        records.div_ceil(self.records_per_block())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;

    #[test]
    fn test_slot_size() {
        let schema = Schema::new()
            .with_field(FieldDef::int("a"))
            .with_field(FieldDef::varchar("b", 10));
        let layout = Layout::new(&schema, 400);
        // flag + int + (len prefix + chars)
        assert_eq!(layout.slot_size(), 4 + 4 + 14);
        assert_eq!(layout.records_per_block(), 18);
    }

    #[test]
    fn test_blocks_for() {
        let schema = Schema::new()
            .with_field(FieldDef::int("x"))
            .with_field(FieldDef::int("y"));
        let layout = Layout::new(&schema, 400);
        assert_eq!(layout.records_per_block(), 33);
        assert_eq!(layout.blocks_for(0), 0);
        assert_eq!(layout.blocks_for(33), 1);
        assert_eq!(layout.blocks_for(100), 4);
    }

    #[test]
    fn test_oversized_slot_still_fits_one_record() {
        let schema = Schema::new().with_field(FieldDef::varchar("blob", 1000));
        let layout = Layout::new(&schema, 400);
        assert_eq!(layout.records_per_block(), 1);
        assert_eq!(layout.blocks_for(3), 3);
    }
}
