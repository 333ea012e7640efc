//! Greedy multi-table join ordering.

use serde::Serialize;
use tracing::{debug, info};

use super::{Candidate, JoinChoice, JoinStrategy, PlanEvent, PlanningConfig, TablePlanner};
use crate::catalog::Catalog;
use crate::error::Error;
use crate::plan::{Plan, ProjectPlan, SelectPlan};
use crate::query::Predicate;
use crate::storage::Transaction;

/// A conjunctive select-project-join query.
#[derive(Debug, Clone, Default)]
pub struct QueryData {
    /// Tables to join.
    pub tables: Vec<String>,
    /// Output fields. Empty keeps every field.
    pub fields: Vec<String>,
    /// Conjunction over fields of the tables.
    pub predicate: Predicate,
}

impl QueryData {
    pub fn new(tables: Vec<String>, fields: Vec<String>, predicate: Predicate) -> Self {
        Self {
            tables,
            fields,
            predicate,
        }
    }
}

/// How one table was added to the plan.
#[derive(Debug, Clone, Serialize)]
pub struct JoinReport {
    /// Table added at this step.
    pub table: String,
    /// Forced strategy, if any.
    pub requested: Option<JoinStrategy>,
    /// Strategy used, `None` when the table had no join term and was
    /// added by a product.
    pub strategy: Option<JoinStrategy>,
    /// Cost of every strategy evaluated.
    pub candidates: Vec<Candidate>,
    /// Planner diagnostics.
    pub events: Vec<PlanEvent>,
    /// Estimated cost of the plan after this step.
    pub blocks: u64,
    /// Estimated rows after this step.
    pub records: u64,
}

impl JoinReport {
    /// Whether a forced strategy was replaced by the product join.
    pub fn fell_back(&self) -> bool {
        match (self.requested, self.strategy) {
            (Some(requested), Some(used)) => requested != used,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// A planned query.
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub plan: Plan,
    pub reports: Vec<JoinReport>,
}

/// Orders joins greedily: start with the table whose selection yields the
/// fewest rows, then repeatedly add the table whose join is cheapest.
pub struct HeuristicPlanner<'a> {
    catalog: &'a Catalog,
    tx: Transaction,
}

impl<'a> HeuristicPlanner<'a> {
    pub fn new(catalog: &'a Catalog, tx: Transaction) -> Self {
        Self { catalog, tx }
    }

    /// Plan `query` under `config`.
    pub fn plan(&self, query: &QueryData, config: &PlanningConfig) -> Result<PlannedQuery, Error> {
        if query.tables.is_empty() {
            return Err(Error::InvalidData("query names no tables".to_string()));
        }

        let mut planners = query
            .tables
            .iter()
            .map(|t| TablePlanner::new(&self.tx, t, query.predicate.clone(), self.catalog))
            .collect::<Result<Vec<_>, _>>()?;

        let mut current = self.lowest_select_plan(&mut planners)?;
        let mut reports = Vec::new();

        while !planners.is_empty() {
            let report = match self.lowest_join_plan(&mut planners, &current, config)? {
                Some((table, choice)) => {
                    current = choice.plan;
                    JoinReport {
                        table,
                        requested: choice.requested,
                        strategy: Some(choice.strategy),
                        candidates: choice.candidates,
                        events: choice.events,
                        blocks: current.blocks_accessed(),
                        records: current.records_output(),
                    }
                }
                None => {
                    let (table, plan) = self.lowest_product_plan(&mut planners, &current)?;
                    debug!(table = %table, "no join term, using product");
                    current = plan;
                    JoinReport {
                        table,
                        requested: config.forced(),
                        strategy: None,
                        candidates: Vec::new(),
                        events: Vec::new(),
                        blocks: current.blocks_accessed(),
                        records: current.records_output(),
                    }
                }
            };
            reports.push(report);
        }

        // Constant-only terms belong to no table, so no planner applied them.
        if let Some(pred) = query.predicate.constant_sub_pred() {
            current = Plan::Select(SelectPlan::new(current, pred));
        }
        if !query.fields.is_empty() {
            current = Plan::Project(ProjectPlan::new(current, &query.fields)?);
        }
        info!(
            tables = query.tables.len(),
            blocks = current.blocks_accessed(),
            "planned query"
        );
        Ok(PlannedQuery {
            plan: current,
            reports,
        })
    }

    fn lowest_select_plan(&self, planners: &mut Vec<TablePlanner>) -> Result<Plan, Error> {
        let mut best: Option<(usize, Plan)> = None;
        for (i, planner) in planners.iter().enumerate() {
            let plan = planner.make_select_plan();
            if best
                .as_ref()
                .map_or(true, |(_, b)| plan.records_output() < b.records_output())
            {
                best = Some((i, plan));
            }
        }
        let Some((i, plan)) = best else {
            return Err(Error::InvalidData("query names no tables".to_string()));
        };
        planners.remove(i);
        Ok(plan)
    }

    fn lowest_join_plan(
        &self,
        planners: &mut Vec<TablePlanner>,
        current: &Plan,
        config: &PlanningConfig,
    ) -> Result<Option<(String, JoinChoice)>, Error> {
        let mut best: Option<(usize, JoinChoice)> = None;
        for (i, planner) in planners.iter().enumerate() {
            let Some(choice) = planner.make_join_plan(current, config)? else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |(_, b)| choice.plan.blocks_accessed() < b.plan.blocks_accessed())
            {
                best = Some((i, choice));
            }
        }
        Ok(best.map(|(i, choice)| {
            let planner = planners.remove(i);
            (planner.table().to_string(), choice)
        }))
    }

    fn lowest_product_plan(
        &self,
        planners: &mut Vec<TablePlanner>,
        current: &Plan,
    ) -> Result<(String, Plan), Error> {
        let mut best: Option<(usize, Plan)> = None;
        for (i, planner) in planners.iter().enumerate() {
            let plan = planner.make_product_plan(current)?;
            if best
                .as_ref()
                .map_or(true, |(_, b)| plan.blocks_accessed() < b.blocks_accessed())
            {
                best = Some((i, plan));
            }
        }
        let Some((i, plan)) = best else {
            return Err(Error::InvalidData("no table left to add".to_string()));
        };
        let planner = planners.remove(i);
        Ok((planner.table().to_string(), plan))
    }
}
