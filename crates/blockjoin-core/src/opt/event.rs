//! Planner diagnostics returned alongside the chosen plan.

use std::fmt;

use serde::Serialize;

use super::JoinStrategy;
use crate::plan::Plan;

/// Why a strategy could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Infeasibility {
    /// No index on the joined table covers a field the join predicate
    /// equates with the other side.
    NoUsableIndex,
    /// The join predicate has no equality between a field of each side.
    NoEquiJoinField,
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::NoUsableIndex => f.write_str("no usable index"),
            Infeasibility::NoEquiJoinField => f.write_str("no equi-join field"),
        }
    }
}

/// Something the planner decided while choosing a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlanEvent {
    /// A strategy was built and costed.
    StrategyCosted {
        strategy: JoinStrategy,
        blocks: u64,
        records: u64,
    },
    /// A strategy could not be built.
    StrategySkipped {
        strategy: JoinStrategy,
        reason: Infeasibility,
    },
    /// The block nested loop join reversed its operands.
    OperandsSwapped { straight: u64, reversed: u64 },
    /// A forced strategy could not be built; the product join was used.
    ForcedFallback {
        requested: JoinStrategy,
        reason: Infeasibility,
    },
    /// The strategy finally used.
    StrategySelected { strategy: JoinStrategy, blocks: u64 },
}

/// Cost of one strategy, `None` when it could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub strategy: JoinStrategy,
    pub blocks: Option<u64>,
}

/// Result of planning one join step.
#[derive(Debug, Clone)]
pub struct JoinChoice {
    /// The plan joining the current plan with the table.
    pub plan: Plan,
    /// Strategy the plan uses.
    pub strategy: JoinStrategy,
    /// Strategy that was forced, if any.
    pub requested: Option<JoinStrategy>,
    /// Every strategy evaluated, in evaluation order.
    pub candidates: Vec<Candidate>,
    /// Diagnostics, in the order they happened.
    pub events: Vec<PlanEvent>,
}

impl JoinChoice {
    /// Whether a forced strategy had to be replaced by the product join.
    pub fn fell_back(&self) -> bool {
        self.requested.is_some_and(|r| r != self.strategy)
    }

    /// Estimated cost of a strategy, if it was evaluated and buildable.
    pub fn cost_of(&self, strategy: JoinStrategy) -> Option<u64> {
        self.candidates
            .iter()
            .find(|c| c.strategy == strategy)
            .and_then(|c| c.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = PlanEvent::ForcedFallback {
            requested: JoinStrategy::Index,
            reason: Infeasibility::NoUsableIndex,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "forced_fallback");
        assert_eq!(json["requested"], "index");
        assert_eq!(json["reason"], "no_usable_index");
    }

    #[test]
    fn test_infeasibility_display() {
        assert_eq!(Infeasibility::NoEquiJoinField.to_string(), "no equi-join field");
    }
}
