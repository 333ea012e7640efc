//! Catalog: table schemas, record layouts, index metadata and statistics.

mod catalog;
mod field;
mod index;
mod layout;
mod schema;
mod stat;
mod types;

pub use catalog::{Catalog, TableDef};
pub use field::FieldDef;
pub use index::{IndexDef, IndexInfo};
pub use layout::Layout;
pub use schema::Schema;
pub use stat::StatInfo;
pub use types::{FieldType, INT_BYTES};
