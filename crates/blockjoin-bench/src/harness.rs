//! Benchmark harness helpers.
//!
//! Each run loads a fresh database, forces or selects a join strategy,
//! executes the query and records time, estimated and observed block
//! accesses.

use std::collections::HashMap;
use std::time::Instant;

use blockjoin_core::{
    Constant, Database, Error, Expression, JoinReport, JoinStrategy, PlanningConfig, Predicate,
    QueryData, StorageConfig, Term,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::fixtures::populate;

/// Header of the CSV report.
pub const CSV_HEADER: &str = "Input Size,Join Algorithm,Runtime,Block Guess,Records Count,Hits,Misses";

/// Output fields of every benchmark query.
const OUTPUT_FIELDS: [&str; 6] = ["sid", "sfirstname", "slastname", "mid", "majorname", "majorabbr"];

/// Join condition between students and majors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// `mid = majorid`
    Equal,
    /// `mid < majorid`
    LessThan,
}

impl JoinKind {
    pub fn predicate(&self) -> Predicate {
        let (lhs, rhs) = (Expression::field("mid"), Expression::field("majorid"));
        match self {
            JoinKind::Equal => Predicate::from_term(Term::equal(lhs, rhs)),
            JoinKind::LessThan => Predicate::from_term(Term::less_than(lhs, rhs)),
        }
    }
}

/// Student-major query with the given predicate.
pub fn student_major_query(predicate: Predicate) -> QueryData {
    QueryData::new(
        vec!["student".to_string(), "major".to_string()],
        OUTPUT_FIELDS.iter().map(|f| f.to_string()).collect(),
        predicate,
    )
}

/// Shared setup for one run.
pub struct BenchContext {
    pub db: Database,
    pub students: usize,
}

impl BenchContext {
    /// A fresh in-memory database holding `students` students.
    pub fn new(students: usize, indexed: bool) -> Result<Self, Error> {
        Self::with_config(StorageConfig::temporary(), students, indexed)
    }

    pub fn with_config(config: StorageConfig, students: usize, indexed: bool) -> Result<Self, Error> {
        let db = Database::open(config)?;
        populate(&db, students, indexed)?;
        Ok(Self { db, students })
    }
}

/// Outcome of one forced-strategy run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub input_size: usize,
    pub requested: JoinStrategy,
    /// Strategy actually executed.
    pub strategy: Option<JoinStrategy>,
    pub runtime_ms: u128,
    pub block_guess: u64,
    pub records: usize,
    pub hits: u64,
    pub misses: u64,
    #[serde(skip)]
    pub rows: Vec<Vec<Constant>>,
}

impl RunResult {
    /// Whether the requested strategy ran.
    pub fn possible(&self) -> bool {
        self.strategy == Some(self.requested)
    }

    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.input_size,
            self.requested.label(),
            self.runtime_ms,
            self.block_guess,
            self.records,
            self.hits,
            self.misses
        )
    }

    pub fn to_text(&self) -> String {
        let test = self.requested.label();
        if !self.possible() {
            return format!("{} mode was not possible.\n", test);
        }
        format!(
            "{test} on input size: {}\n\
             {test} time taken: {}\n\
             {test} guess for block accesses: {}\n\
             {test} records: {}\n\
             {test} hits: {}\n\
             {test} misses (disk reads): {}\n",
            self.input_size, self.runtime_ms, self.block_guess, self.records, self.hits, self.misses
        )
    }
}

/// Run `query` on a fresh database with `strategy` forced.
pub fn run_strategy(
    students: usize,
    query: &QueryData,
    strategy: JoinStrategy,
    indexed: bool,
) -> Result<RunResult, Error> {
    let ctx = BenchContext::new(students, indexed)?;
    ctx.db.reset_buffer_stats();

    let start = Instant::now();
    let result = ctx.db.execute(query, &PlanningConfig::Forced(strategy))?;
    let runtime_ms = start.elapsed().as_millis();
    let stats = ctx.db.buffer_stats();

    let used = join_strategy(&result.reports);
    if used != Some(strategy) {
        warn!(requested = %strategy, "strategy not possible for query");
    }
    info!(
        students,
        strategy = %strategy,
        runtime_ms,
        records = result.rows.len(),
        "finished run"
    );

    Ok(RunResult {
        input_size: students,
        requested: strategy,
        strategy: used,
        runtime_ms,
        block_guess: result.blocks_estimate,
        records: result.rows.len(),
        hits: stats.hits,
        misses: stats.misses,
        rows: result.rows,
    })
}

fn join_strategy(reports: &[JoinReport]) -> Option<JoinStrategy> {
    reports.last().and_then(|r| r.strategy)
}

/// Result of comparing strategies on the same query.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectnessReport {
    pub kind: JoinKind,
    pub strategies: Vec<JoinStrategy>,
    pub records: usize,
    /// Rows whose multiplicity differs between strategies.
    pub mismatches: usize,
}

impl CorrectnessReport {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Run the join through every strategy that applies to it and compare the
/// resulting row multisets.
pub fn correctness_check(students: usize, kind: JoinKind) -> Result<CorrectnessReport, Error> {
    let strategies = match kind {
        JoinKind::Equal => vec![
            JoinStrategy::NestedBlock,
            JoinStrategy::Product,
            JoinStrategy::Merge,
            JoinStrategy::Index,
        ],
        JoinKind::LessThan => vec![JoinStrategy::NestedBlock, JoinStrategy::Product],
    };
    let query = student_major_query(kind.predicate());

    let mut counts: Vec<HashMap<Vec<Constant>, usize>> = Vec::new();
    let mut records = 0;
    for strategy in &strategies {
        let run = run_strategy(students, &query, *strategy, true)?;
        records = run.records;
        let mut multiset = HashMap::new();
        for row in run.rows {
            *multiset.entry(row).or_insert(0) += 1;
        }
        counts.push(multiset);
    }

    let mismatches = match counts.split_first() {
        Some((first, rest)) => rest
            .iter()
            .map(|other| {
                first
                    .iter()
                    .filter(|(row, n)| other.get(*row) != Some(*n))
                    .count()
                    + other.keys().filter(|row| !first.contains_key(*row)).count()
            })
            .sum(),
        None => 0,
    };

    Ok(CorrectnessReport {
        kind,
        strategies,
        records,
        mismatches,
    })
}

/// Costs the automatic planner saw for one query.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionCase {
    pub description: String,
    pub predicate: String,
    pub report: Option<JoinReport>,
}

impl SelectionCase {
    pub fn to_text(&self) -> String {
        let mut out = format!("Running {}\n", self.description);
        let Some(report) = &self.report else {
            out.push_str("    no join step\n");
            return out;
        };
        for strategy in [
            JoinStrategy::Product,
            JoinStrategy::NestedBlock,
            JoinStrategy::Index,
            JoinStrategy::Merge,
        ] {
            let cost = report
                .candidates
                .iter()
                .find(|c| c.strategy == strategy)
                .and_then(|c| c.blocks);
            match cost {
                Some(blocks) => out.push_str(&format!(
                    "    Number of Blocks Accessed in {}: {}\n",
                    strategy.label(),
                    blocks
                )),
                None => out.push_str(&format!("    {} was not possible\n", strategy.label())),
            }
        }
        match report.strategy {
            Some(s) => out.push_str(&format!("    {} was selected\n", s.label())),
            None => out.push_str("    no join predicate, product used\n"),
        }
        out
    }
}

/// The queries used to check strategy selection.
pub fn selection_queries() -> Vec<(&'static str, Predicate)> {
    let f = Expression::field;
    let c = |n: i32| Expression::constant(Constant::Int(n));
    vec![
        (
            "an equals join query",
            Predicate::from_term(Term::equal(f("mid"), f("majorid"))),
        ),
        (
            "a non-indexed equals join query",
            Predicate::from_term(Term::equal(f("sid"), f("mid"))),
        ),
        (
            "an equals join with multiple conditions query",
            Predicate::from_term(Term::equal(f("mid"), f("majorid")))
                .with_term(Term::less_than(f("sid"), c(140))),
        ),
        (
            "a less than join query",
            Predicate::from_term(Term::less_than(f("mid"), f("majorid"))),
        ),
        (
            "a less than with multiple conditions query",
            Predicate::from_term(Term::less_than(f("mid"), f("majorid")))
                .with_term(Term::equal(f("sid"), c(140))),
        ),
    ]
}

/// Plan every selection query automatically and report the candidates.
pub fn selection_report(students: usize) -> Result<Vec<SelectionCase>, Error> {
    let ctx = BenchContext::new(students, true)?;
    selection_queries()
        .into_iter()
        .map(|(description, predicate)| {
            let text = predicate.to_string();
            let query = student_major_query(predicate);
            let planned = ctx.db.plan_query(&query, &PlanningConfig::Automatic)?;
            Ok(SelectionCase {
                description: description.to_string(),
                predicate: text,
                report: planned.reports.into_iter().last(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_runs_report_counts() {
        let query = student_major_query(JoinKind::Equal.predicate());
        let run = run_strategy(30, &query, JoinStrategy::NestedBlock, true).unwrap();
        assert!(run.possible());
        assert_eq!(run.records, 30);
        assert!(run.hits + run.misses > 0);
        assert!(run.csv_row().starts_with("30,Block Nested Loop Join,"));
    }

    #[test]
    fn test_on_disk_context() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = BenchContext::with_config(StorageConfig::new(dir.path()), 25, true).unwrap();
        let query = student_major_query(JoinKind::Equal.predicate());
        let result = ctx
            .db
            .execute(&query, &PlanningConfig::Automatic)
            .unwrap();
        assert_eq!(result.rows.len(), 25);
        assert_eq!(result.fields.len(), OUTPUT_FIELDS.len());
    }

    #[test]
    fn test_forced_merge_not_possible_for_less_than() {
        let query = student_major_query(JoinKind::LessThan.predicate());
        let run = run_strategy(30, &query, JoinStrategy::Merge, true).unwrap();
        assert!(!run.possible());
        assert_eq!(run.strategy, Some(JoinStrategy::Product));
        assert_eq!(run.to_text(), "Merge Join mode was not possible.\n");
    }

    #[test]
    fn test_correctness_equal_and_less_than() {
        let eq = correctness_check(40, JoinKind::Equal).unwrap();
        assert!(eq.passed(), "{:?}", eq);
        assert_eq!(eq.records, 40);

        let lt = correctness_check(40, JoinKind::LessThan).unwrap();
        assert!(lt.passed(), "{:?}", lt);
    }

    #[test]
    fn test_selection_report_covers_queries() {
        let cases = selection_report(40).unwrap();
        assert_eq!(cases.len(), 5);
        for case in &cases {
            let report = case.report.as_ref().unwrap();
            let selected = report.strategy.unwrap();
            let best = report
                .candidates
                .iter()
                .filter_map(|c| c.blocks)
                .min()
                .unwrap();
            let chosen = report
                .candidates
                .iter()
                .find(|c| c.strategy == selected)
                .and_then(|c| c.blocks)
                .unwrap();
            assert_eq!(chosen, best);
        }
        // No index or equality on the less-than join.
        let lt = cases[3].report.as_ref().unwrap();
        assert!(lt
            .candidates
            .iter()
            .any(|c| c.strategy == JoinStrategy::Merge && c.blocks.is_none()));
    }
}
