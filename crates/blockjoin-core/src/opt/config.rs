//! Join strategies and planning configuration.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// The join algorithms a table planner chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Probe an index on the joined table for every outer row.
    Index,
    /// Block nested loop over a materialized inner side.
    NestedBlock,
    /// Chunked product filtered by the join predicate.
    Product,
    /// Sort both sides on the join key and merge.
    Merge,
}

impl JoinStrategy {
    /// Order in which automatic planning evaluates strategies. Earlier
    /// strategies win ties.
    pub const EVALUATION_ORDER: [JoinStrategy; 4] = [
        JoinStrategy::Product,
        JoinStrategy::Merge,
        JoinStrategy::NestedBlock,
        JoinStrategy::Index,
    ];

    /// Human-readable name used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            JoinStrategy::Index => "Index Join",
            JoinStrategy::NestedBlock => "Block Nested Loop Join",
            JoinStrategy::Product => "Multi Buffer Product and Select",
            JoinStrategy::Merge => "Merge Join",
        }
    }

    /// Short name accepted by [`FromStr`].
    pub fn key(&self) -> &'static str {
        match self {
            JoinStrategy::Index => "index",
            JoinStrategy::NestedBlock => "nested-block",
            JoinStrategy::Product => "product",
            JoinStrategy::Merge => "merge",
        }
    }
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for JoinStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "index" => Ok(JoinStrategy::Index),
            "nested-block" | "nested_block" | "bnl" => Ok(JoinStrategy::NestedBlock),
            "product" => Ok(JoinStrategy::Product),
            "merge" => Ok(JoinStrategy::Merge),
            other => Err(format!("unknown join strategy: {}", other)),
        }
    }
}

/// How a planning call picks the join strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PlanningConfig {
    /// Cost every applicable strategy and keep the cheapest.
    #[default]
    Automatic,
    /// Build only the given strategy, falling back to the product join when
    /// it cannot be built.
    Forced(JoinStrategy),
}

impl PlanningConfig {
    /// The forced strategy, if any.
    pub fn forced(&self) -> Option<JoinStrategy> {
        match self {
            PlanningConfig::Automatic => None,
            PlanningConfig::Forced(s) => Some(*s),
        }
    }
}
