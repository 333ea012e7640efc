//! Blockjoin Core - Storage, catalog, join planning and execution.
//!
//! This crate provides a small relational engine whose planner chooses, for
//! each table added to a query, between an index join, a block nested loop
//! join, a sort-merge join and a chunked product by estimated block reads.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod database;
pub mod error;
pub mod opt;
pub mod plan;
pub mod query;
pub mod storage;

pub use catalog::{Catalog, FieldDef, FieldType, IndexInfo, Layout, Schema, StatInfo};
pub use database::{Database, QueryResult};
pub use error::Error;
pub use opt::{
    Candidate, HeuristicPlanner, Infeasibility, JoinChoice, JoinReport, JoinStrategy, PlanEvent,
    PlannedQuery, PlanningConfig, QueryData, TablePlanner,
};
pub use plan::Plan;
pub use query::{Comparator, Constant, Expression, Predicate, Scan, Term};
pub use storage::{BufferStats, StorageConfig, StorageEngine, Transaction};
