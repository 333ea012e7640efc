//! Query optimization.
//!
//! [`TablePlanner`] decides how one table joins the plan built so far;
//! [`HeuristicPlanner`] orders the tables of a whole query.

mod config;
mod event;
mod heuristic;
mod table_planner;

pub use config::{JoinStrategy, PlanningConfig};
pub use event::{Candidate, Infeasibility, JoinChoice, PlanEvent};
pub use heuristic::{HeuristicPlanner, JoinReport, PlannedQuery, QueryData};
pub use table_planner::TablePlanner;
