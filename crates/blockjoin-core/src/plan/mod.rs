//! Plan trees.
//!
//! A [`Plan`] is a closed set of operators. Every node reports its output
//! schema and three estimates derived from catalog statistics: blocks
//! accessed, records output and per-field distinct values. Estimates are
//! pure functions of the tree, so repeated calls agree. [`Plan::open`]
//! executes the node and returns a cursor positioned before the first row.

mod chunk;
mod index_join;
mod index_select;
mod materialize;
mod merge_join;
mod nested_block;
mod product;
mod select;
mod sort;
mod table;

use std::fmt::Write as _;

pub use index_join::{IndexJoinPlan, IndexJoinScan};
pub use index_select::{IndexSelectPlan, IndexSelectScan};
pub use materialize::MaterializePlan;
pub use merge_join::{MergeJoinPlan, MergeJoinScan};
pub use nested_block::NestedBlockJoinPlan;
pub use product::{MultibufferProductPlan, ProductPlan, ProductScan};
pub use select::{ProjectPlan, ProjectScan, SelectPlan, SelectScan};
pub use sort::SortPlan;
pub use table::TablePlan;

use crate::catalog::Schema;
use crate::error::Error;
use crate::query::{DistinctValues, Scan};

/// A node of a plan tree. Children are owned.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Scan of a stored table.
    Table(TablePlan),
    /// Filter by a predicate.
    Select(SelectPlan),
    /// Restriction to a subset of fields.
    Project(ProjectPlan),
    /// Equality lookup through an index.
    IndexSelect(IndexSelectPlan),
    /// Tuple-at-a-time product.
    Product(ProductPlan),
    /// Chunked product.
    MultibufferProduct(MultibufferProductPlan),
    /// Block nested loop join.
    NestedBlockJoin(NestedBlockJoinPlan),
    /// Sort-merge join.
    MergeJoin(MergeJoinPlan),
    /// Index nested loop join.
    IndexJoin(IndexJoinPlan),
    /// Copy into a temporary table.
    Materialize(MaterializePlan),
    /// Ordered copy into a temporary table.
    Sort(SortPlan),
}

impl Plan {
    /// Output schema.
    pub fn schema(&self) -> &Schema {
        match self {
            Plan::Table(p) => p.schema(),
            Plan::Select(p) => p.schema(),
            Plan::Project(p) => p.schema(),
            Plan::IndexSelect(p) => p.schema(),
            Plan::Product(p) => p.schema(),
            Plan::MultibufferProduct(p) => p.schema(),
            Plan::NestedBlockJoin(p) => p.schema(),
            Plan::MergeJoin(p) => p.schema(),
            Plan::IndexJoin(p) => p.schema(),
            Plan::Materialize(p) => p.schema(),
            Plan::Sort(p) => p.schema(),
        }
    }

    /// Estimated block reads to evaluate the plan once.
    pub fn blocks_accessed(&self) -> u64 {
        match self {
            Plan::Table(p) => p.blocks_accessed(),
            Plan::Select(p) => p.blocks_accessed(),
            Plan::Project(p) => p.blocks_accessed(),
            Plan::IndexSelect(p) => p.blocks_accessed(),
            Plan::Product(p) => p.blocks_accessed(),
            Plan::MultibufferProduct(p) => p.blocks_accessed(),
            Plan::NestedBlockJoin(p) => p.blocks_accessed(),
            Plan::MergeJoin(p) => p.blocks_accessed(),
            Plan::IndexJoin(p) => p.blocks_accessed(),
            Plan::Materialize(p) => p.blocks_accessed(),
            Plan::Sort(p) => p.blocks_accessed(),
        }
    }

    /// Estimated number of output rows.
    pub fn records_output(&self) -> u64 {
        match self {
            Plan::Table(p) => p.records_output(),
            Plan::Select(p) => p.records_output(),
            Plan::Project(p) => p.records_output(),
            Plan::IndexSelect(p) => p.records_output(),
            Plan::Product(p) => p.records_output(),
            Plan::MultibufferProduct(p) => p.records_output(),
            Plan::NestedBlockJoin(p) => p.records_output(),
            Plan::MergeJoin(p) => p.records_output(),
            Plan::IndexJoin(p) => p.records_output(),
            Plan::Materialize(p) => p.records_output(),
            Plan::Sort(p) => p.records_output(),
        }
    }

    /// Estimated number of distinct values of `field` in the output.
    pub fn distinct_values(&self, field: &str) -> u64 {
        match self {
            Plan::Table(p) => p.distinct_values(field),
            Plan::Select(p) => p.distinct_values(field),
            Plan::Project(p) => p.distinct_values(field),
            Plan::IndexSelect(p) => p.distinct_values(field),
            Plan::Product(p) => p.distinct_values(field),
            Plan::MultibufferProduct(p) => p.distinct_values(field),
            Plan::NestedBlockJoin(p) => DistinctValues::distinct_values(p, field),
            Plan::MergeJoin(p) => p.distinct_values(field),
            Plan::IndexJoin(p) => p.distinct_values(field),
            Plan::Materialize(p) => p.distinct_values(field),
            Plan::Sort(p) => p.distinct_values(field),
        }
    }

    /// Execute the plan.
    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        match self {
            Plan::Table(p) => p.open(),
            Plan::Select(p) => p.open(),
            Plan::Project(p) => p.open(),
            Plan::IndexSelect(p) => p.open(),
            Plan::Product(p) => p.open(),
            Plan::MultibufferProduct(p) => p.open(),
            Plan::NestedBlockJoin(p) => p.open(),
            Plan::MergeJoin(p) => p.open(),
            Plan::IndexJoin(p) => p.open(),
            Plan::Materialize(p) => p.open(),
            Plan::Sort(p) => p.open(),
        }
    }

    /// Short operator name.
    pub fn name(&self) -> &'static str {
        match self {
            Plan::Table(_) => "TableScan",
            Plan::Select(_) => "Select",
            Plan::Project(_) => "Project",
            Plan::IndexSelect(_) => "IndexSelect",
            Plan::Product(_) => "Product",
            Plan::MultibufferProduct(_) => "MultibufferProduct",
            Plan::NestedBlockJoin(_) => "NestedBlockJoin",
            Plan::MergeJoin(_) => "MergeJoin",
            Plan::IndexJoin(_) => "IndexJoin",
            Plan::Materialize(_) => "Materialize",
            Plan::Sort(_) => "Sort",
        }
    }

    /// Render the tree, one node per line, with its estimates.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let detail = match self {
            Plan::Table(p) => format!("({})", p.table()),
            Plan::Select(p) => format!("({})", p.predicate()),
            Plan::Project(p) => format!("({})", p.schema().fields().collect::<Vec<_>>().join(", ")),
            Plan::IndexSelect(p) => {
                format!("({}.{} = {})", p.table().table(), p.index().field(), p.value())
            }
            Plan::NestedBlockJoin(p) if p.swapped() => format!("({}, swapped)", p.predicate()),
            Plan::NestedBlockJoin(p) => format!("({})", p.predicate()),
            Plan::MergeJoin(p) => format!("({} = {})", p.lhs_field(), p.rhs_field()),
            Plan::IndexJoin(p) => format!(
                "({} = {}.{} via {})",
                p.join_field(),
                p.inner().table(),
                p.index().field(),
                p.index().name()
            ),
            Plan::Sort(p) => format!("(by {})", p.key()),
            _ => String::new(),
        };
        let _ = writeln!(
            out,
            "{:indent$}{}{} [blocks={}, records={}]",
            "",
            self.name(),
            detail,
            self.blocks_accessed(),
            self.records_output(),
            indent = depth * 2
        );

        for child in self.children() {
            child.explain_into(out, depth + 1);
        }
        if let Plan::IndexJoin(p) = self {
            let inner = p.inner();
            let _ = writeln!(
                out,
                "{:indent$}TableScan({}) [blocks={}, records={}]",
                "",
                inner.table(),
                inner.blocks_accessed(),
                inner.records_output(),
                indent = (depth + 1) * 2
            );
        }
    }

    /// Child plans, left to right.
    pub fn children(&self) -> Vec<&Plan> {
        match self {
            Plan::Table(_) | Plan::IndexSelect(_) => Vec::new(),
            Plan::Select(p) => vec![p.child()],
            Plan::Project(p) => vec![p.child()],
            Plan::Product(p) => vec![p.lhs(), p.rhs()],
            Plan::MultibufferProduct(p) => vec![p.lhs(), p.rhs()],
            Plan::NestedBlockJoin(p) => vec![p.outer(), p.inner()],
            Plan::MergeJoin(p) => vec![p.lhs(), p.rhs()],
            Plan::IndexJoin(p) => vec![p.outer()],
            Plan::Materialize(p) => vec![p.child()],
            Plan::Sort(p) => vec![p.child()],
        }
    }
}

impl DistinctValues for Plan {
    fn distinct_values(&self, field: &str) -> u64 {
        Plan::distinct_values(self, field)
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Plan {
                fn from(plan: $ty) -> Self {
                    Plan::$variant(plan)
                }
            }
        )*
    };
}

impl_from_variant!(
    Table(TablePlan),
    Select(SelectPlan),
    Project(ProjectPlan),
    IndexSelect(IndexSelectPlan),
    Product(ProductPlan),
    MultibufferProduct(MultibufferProductPlan),
    NestedBlockJoin(NestedBlockJoinPlan),
    MergeJoin(MergeJoinPlan),
    IndexJoin(IndexJoinPlan),
    Materialize(MaterializePlan),
    Sort(SortPlan),
);
