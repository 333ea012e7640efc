//! Per-table plan construction and join strategy selection.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::{Candidate, Infeasibility, JoinChoice, JoinStrategy, PlanEvent, PlanningConfig};
use crate::catalog::{Catalog, IndexInfo, Schema};
use crate::error::Error;
use crate::plan::{
    IndexJoinPlan, IndexSelectPlan, MergeJoinPlan, MultibufferProductPlan, NestedBlockJoinPlan,
    Plan, SelectPlan, TablePlan,
};
use crate::query::{Comparator, Predicate};
use crate::storage::Transaction;

/// Builds plans that read one table or join it to a plan built so far.
///
/// One planner exists per table per query. It holds the table's base plan,
/// the indexes on the table keyed by field, and the query predicate.
#[derive(Debug, Clone)]
pub struct TablePlanner {
    tx: Transaction,
    plan: TablePlan,
    pred: Predicate,
    indexes: BTreeMap<String, IndexInfo>,
}

impl TablePlanner {
    /// Create a planner for `table` under the query predicate `pred`.
    pub fn new(
        tx: &Transaction,
        table: &str,
        pred: Predicate,
        catalog: &Catalog,
    ) -> Result<Self, Error> {
        let plan = TablePlan::new(tx, table, catalog)?;
        let indexes = catalog.indexes_for(table)?;
        Ok(Self {
            tx: tx.clone(),
            plan,
            pred,
            indexes,
        })
    }

    pub fn table(&self) -> &str {
        self.plan.table()
    }

    pub fn schema(&self) -> &Schema {
        self.plan.schema()
    }

    /// Indexes on the table, keyed by indexed field.
    pub fn indexes(&self) -> &BTreeMap<String, IndexInfo> {
        &self.indexes
    }

    /// Best plan reading this table alone.
    ///
    /// The first indexed field (in field order) equated with a constant is
    /// answered through its index; the remaining single-table terms filter
    /// the result.
    pub fn make_select_plan(&self) -> Plan {
        let Some(select) = self.pred.select_sub_pred(self.schema()) else {
            return Plan::Table(self.plan.clone());
        };

        let probe = self.indexes.iter().find_map(|(field, info)| {
            select
                .constant_equality(field)
                .map(|(i, value)| (info.clone(), i, value.clone()))
        });

        match probe {
            Some((info, consumed, value)) => {
                debug!(table = self.table(), index = info.name(), "using index select");
                let plan = Plan::IndexSelect(IndexSelectPlan::new(self.plan.clone(), info, value));
                with_filter(plan, select.without_term(consumed))
            }
            None => with_filter(Plan::Table(self.plan.clone()), select),
        }
    }

    /// Chunked product of `current` with this table's filtered scan.
    pub fn make_product_plan(&self, current: &Plan) -> Result<Plan, Error> {
        let mine = self.add_select_pred(Plan::Table(self.plan.clone()));
        Ok(Plan::MultibufferProduct(MultibufferProductPlan::new(
            &self.tx,
            current.clone(),
            mine,
        )?))
    }

    /// Join this table to `current`.
    ///
    /// Returns `Ok(None)` when the predicate has no term spanning both
    /// schemas. Otherwise the returned choice carries the plan, the strategy
    /// it uses and the diagnostics of the decision.
    pub fn make_join_plan(
        &self,
        current: &Plan,
        config: &PlanningConfig,
    ) -> Result<Option<JoinChoice>, Error> {
        let Some(join_pred) = self.pred.join_sub_pred(current.schema(), self.schema()) else {
            debug!(table = self.table(), "no join predicate");
            return Ok(None);
        };

        let choice = match config {
            PlanningConfig::Automatic => self.choose_cheapest(current, &join_pred)?,
            PlanningConfig::Forced(strategy) => self.build_forced(*strategy, current, &join_pred)?,
        };
        Ok(Some(choice))
    }

    fn choose_cheapest(&self, current: &Plan, join_pred: &Predicate) -> Result<JoinChoice, Error> {
        let mut events = Vec::new();
        let mut candidates = Vec::new();
        let mut best: Option<(JoinStrategy, Plan, u64)> = None;

        for strategy in JoinStrategy::EVALUATION_ORDER {
            match self.build(strategy, current, join_pred, &mut events)? {
                Ok(plan) => {
                    let blocks = plan.blocks_accessed();
                    let records = plan.records_output();
                    debug!(table = self.table(), strategy = %strategy, blocks, records, "costed join");
                    events.push(PlanEvent::StrategyCosted {
                        strategy,
                        blocks,
                        records,
                    });
                    candidates.push(Candidate {
                        strategy,
                        blocks: Some(blocks),
                    });
                    if best.as_ref().map_or(true, |(_, _, cost)| blocks < *cost) {
                        best = Some((strategy, plan, blocks));
                    }
                }
                Err(reason) => {
                    debug!(table = self.table(), strategy = %strategy, %reason, "join not possible");
                    events.push(PlanEvent::StrategySkipped { strategy, reason });
                    candidates.push(Candidate {
                        strategy,
                        blocks: None,
                    });
                }
            }
        }

        let Some((strategy, plan, blocks)) = best else {
            return Err(Error::InvalidData(
                "no join strategy could be built".to_string(),
            ));
        };
        info!(table = self.table(), strategy = %strategy, blocks, "selected join");
        events.push(PlanEvent::StrategySelected { strategy, blocks });

        Ok(JoinChoice {
            plan,
            strategy,
            requested: None,
            candidates,
            events,
        })
    }

    fn build_forced(
        &self,
        requested: JoinStrategy,
        current: &Plan,
        join_pred: &Predicate,
    ) -> Result<JoinChoice, Error> {
        let mut events = Vec::new();
        let mut candidates = Vec::new();

        let (strategy, plan) = match self.build(requested, current, join_pred, &mut events)? {
            Ok(plan) => (requested, plan),
            Err(reason) => {
                warn!(table = self.table(), requested = %requested, %reason, "forced join not possible, using product");
                events.push(PlanEvent::ForcedFallback { requested, reason });
                candidates.push(Candidate {
                    strategy: requested,
                    blocks: None,
                });
                (JoinStrategy::Product, self.product_join(current, join_pred)?)
            }
        };

        let blocks = plan.blocks_accessed();
        events.push(PlanEvent::StrategyCosted {
            strategy,
            blocks,
            records: plan.records_output(),
        });
        candidates.push(Candidate {
            strategy,
            blocks: Some(blocks),
        });
        events.push(PlanEvent::StrategySelected { strategy, blocks });

        Ok(JoinChoice {
            plan,
            strategy,
            requested: Some(requested),
            candidates,
            events,
        })
    }

    /// Build one strategy. The inner result is `Err` when the strategy does
    /// not apply to this predicate.
    fn build(
        &self,
        strategy: JoinStrategy,
        current: &Plan,
        join_pred: &Predicate,
        events: &mut Vec<PlanEvent>,
    ) -> Result<Result<Plan, Infeasibility>, Error> {
        Ok(match strategy {
            JoinStrategy::Product => Ok(self.product_join(current, join_pred)?),
            JoinStrategy::Merge => self
                .merge_join(current, join_pred)?
                .ok_or(Infeasibility::NoEquiJoinField),
            JoinStrategy::NestedBlock => Ok(self.nested_block_join(current, join_pred, events)?),
            JoinStrategy::Index => self
                .index_join(current, join_pred)?
                .ok_or(Infeasibility::NoUsableIndex),
        })
    }

    fn product_join(&self, current: &Plan, join_pred: &Predicate) -> Result<Plan, Error> {
        let product = self.make_product_plan(current)?;
        Ok(with_filter(product, join_pred.clone()))
    }

    fn merge_join(&self, current: &Plan, join_pred: &Predicate) -> Result<Option<Plan>, Error> {
        let current_schema = current.schema();
        let my_schema = self.schema();

        for (i, term) in join_pred.terms().iter().enumerate() {
            if term.comparator() != Comparator::Equal {
                continue;
            }
            let (Some(l), Some(r)) = (term.lhs().as_field(), term.rhs().as_field()) else {
                continue;
            };
            let (current_field, my_field) =
                if current_schema.has_field(l) && my_schema.has_field(r) {
                    (l, r)
                } else if current_schema.has_field(r) && my_schema.has_field(l) {
                    (r, l)
                } else {
                    continue;
                };

            let mine = self.add_select_pred(Plan::Table(self.plan.clone()));
            let plan = MergeJoinPlan::new(&self.tx, current.clone(), mine, current_field, my_field)?;
            return Ok(Some(with_filter(plan.into(), join_pred.without_term(i))));
        }
        Ok(None)
    }

    fn nested_block_join(
        &self,
        current: &Plan,
        join_pred: &Predicate,
        events: &mut Vec<PlanEvent>,
    ) -> Result<Plan, Error> {
        let mine = self.add_select_pred(Plan::Table(self.plan.clone()));
        let straight = crate::plan::ProductPlan::cost_of(current, &mine);
        let reversed = crate::plan::ProductPlan::cost_of(&mine, current);
        let plan = NestedBlockJoinPlan::new(&self.tx, current.clone(), mine, join_pred.clone())?;
        if plan.swapped() {
            events.push(PlanEvent::OperandsSwapped { straight, reversed });
        }
        Ok(plan.into())
    }

    fn index_join(&self, current: &Plan, join_pred: &Predicate) -> Result<Option<Plan>, Error> {
        let current_schema = current.schema();

        for (field, info) in &self.indexes {
            let found = join_pred.terms().iter().enumerate().find_map(|(i, term)| {
                term.equates_with_field(field)
                    .filter(|other| current_schema.has_field(other))
                    .map(|other| (i, other.to_string()))
            });
            let Some((consumed, outer_field)) = found else {
                continue;
            };

            let plan = IndexJoinPlan::new(
                current.clone(),
                self.plan.clone(),
                info.clone(),
                outer_field,
            )?;
            let plan = self.add_select_pred(plan.into());
            return Ok(Some(with_filter(plan, join_pred.without_term(consumed))));
        }
        Ok(None)
    }

    fn add_select_pred(&self, plan: Plan) -> Plan {
        match self.pred.select_sub_pred(self.schema()) {
            Some(select) => with_filter(plan, select),
            None => plan,
        }
    }
}

fn with_filter(plan: Plan, pred: Predicate) -> Plan {
    if pred.is_empty() {
        plan
    } else {
        Plan::Select(SelectPlan::new(plan, pred))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Schema;
    use crate::query::{Constant, Expression, Term};
    use crate::storage::{StorageConfig, StorageEngine};
    use std::sync::Arc;

    fn setup() -> (Arc<StorageEngine>, Catalog) {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let catalog = Catalog::open(engine.clone()).unwrap();

        let mut a = Schema::new();
        a.add_int_field("ax");
        a.add_int_field("ay");
        catalog.create_table("a", a).unwrap();
        let file = catalog.table_file("a").unwrap();
        for i in 0..100 {
            file.insert(&[Constant::Int(i), Constant::Int(i % 10)]).unwrap();
        }

        let mut b = Schema::new();
        b.add_int_field("by");
        b.add_int_field("bz");
        catalog.create_table("b", b).unwrap();
        let file = catalog.table_file("b").unwrap();
        for i in 0..10 {
            file.insert(&[Constant::Int(i), Constant::Int(i * 2)]).unwrap();
        }
        catalog.create_index("b_by", "b", "by").unwrap();
        (engine, catalog)
    }

    fn equi_join() -> Predicate {
        Predicate::from_term(Term::equal(Expression::field("ay"), Expression::field("by")))
    }

    #[test]
    fn test_not_joinable_without_spanning_term() {
        let (engine, catalog) = setup();
        let tx = engine.begin();
        let pred = Predicate::from_term(Term::equal(
            Expression::field("bz"),
            Expression::constant(Constant::Int(4)),
        ));
        let a = TablePlanner::new(&tx, "a", pred.clone(), &catalog).unwrap();
        let b = TablePlanner::new(&tx, "b", pred, &catalog).unwrap();
        let current = a.make_select_plan();
        assert!(b
            .make_join_plan(&current, &PlanningConfig::Automatic)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_index_select_consumes_term() {
        let (engine, catalog) = setup();
        let tx = engine.begin();
        let pred = Predicate::new()
            .with_term(Term::equal(
                Expression::field("by"),
                Expression::constant(Constant::Int(3)),
            ))
            .with_term(Term::less_than(
                Expression::field("bz"),
                Expression::constant(Constant::Int(100)),
            ));
        let planner = TablePlanner::new(&tx, "b", pred, &catalog).unwrap();
        let plan = planner.make_select_plan();
        let Plan::Select(select) = &plan else {
            panic!("expected select over index select, got {}", plan.name());
        };
        assert_eq!(select.predicate().terms().len(), 1);
        assert!(matches!(select.child(), Plan::IndexSelect(_)));
    }

    #[test]
    fn test_select_plan_without_index() {
        let (engine, catalog) = setup();
        let tx = engine.begin();
        let pred = Predicate::from_term(Term::equal(
            Expression::field("ax"),
            Expression::constant(Constant::Int(7)),
        ));
        let planner = TablePlanner::new(&tx, "a", pred, &catalog).unwrap();
        assert!(matches!(planner.make_select_plan(), Plan::Select(_)));

        let bare = TablePlanner::new(&tx, "a", Predicate::new(), &catalog).unwrap();
        assert!(matches!(bare.make_select_plan(), Plan::Table(_)));
    }

    #[test]
    fn test_automatic_picks_index_join() {
        let (engine, catalog) = setup();
        let tx = engine.begin();
        let a = TablePlanner::new(&tx, "a", equi_join(), &catalog).unwrap();
        let b = TablePlanner::new(&tx, "b", equi_join(), &catalog).unwrap();
        let current = a.make_select_plan();

        let choice = b
            .make_join_plan(&current, &PlanningConfig::Automatic)
            .unwrap()
            .unwrap();
        assert_eq!(choice.strategy, JoinStrategy::Index);
        assert_eq!(choice.cost_of(JoinStrategy::Product), Some(5));
        assert_eq!(choice.cost_of(JoinStrategy::Merge), Some(15));
        assert_eq!(choice.cost_of(JoinStrategy::NestedBlock), Some(5));
        assert_eq!(choice.cost_of(JoinStrategy::Index), Some(4));
        assert_eq!(choice.plan.records_output(), 100);
        assert!(choice
            .events
            .iter()
            .any(|e| matches!(e, PlanEvent::OperandsSwapped { .. })));
        assert!(!choice.fell_back());
    }

    #[test]
    fn test_forced_index_falls_back_on_less_than() {
        let (engine, catalog) = setup();
        let tx = engine.begin();
        let pred =
            Predicate::from_term(Term::less_than(Expression::field("ay"), Expression::field("by")));
        let a = TablePlanner::new(&tx, "a", pred.clone(), &catalog).unwrap();
        let b = TablePlanner::new(&tx, "b", pred, &catalog).unwrap();
        let current = a.make_select_plan();

        for forced in [JoinStrategy::Index, JoinStrategy::Merge] {
            let choice = b
                .make_join_plan(&current, &PlanningConfig::Forced(forced))
                .unwrap()
                .unwrap();
            assert_eq!(choice.strategy, JoinStrategy::Product);
            assert_eq!(choice.requested, Some(forced));
            assert!(choice.fell_back());
            assert!(choice
                .events
                .iter()
                .any(|e| matches!(e, PlanEvent::ForcedFallback { requested, .. } if *requested == forced)));
        }
    }

    #[test]
    fn test_forced_nested_block_runs() {
        let (engine, catalog) = setup();
        let tx = engine.begin();
        let a = TablePlanner::new(&tx, "a", equi_join(), &catalog).unwrap();
        let b = TablePlanner::new(&tx, "b", equi_join(), &catalog).unwrap();
        let current = a.make_select_plan();
        let choice = b
            .make_join_plan(&current, &PlanningConfig::Forced(JoinStrategy::NestedBlock))
            .unwrap()
            .unwrap();
        assert_eq!(choice.strategy, JoinStrategy::NestedBlock);
        assert!(!choice.fell_back());

        let mut scan = choice.plan.open().unwrap();
        let mut count = 0;
        while scan.next().unwrap() {
            assert_eq!(scan.get_val("ay").unwrap(), scan.get_val("by").unwrap());
            count += 1;
        }
        assert_eq!(count, 100);
    }
}
