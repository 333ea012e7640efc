//! Blockjoin benchmark driver.
//!
//! Runs the student-major join under each forced strategy, checks that the
//! strategies agree, or reports what the automatic planner chose.

use clap::{Parser, ValueEnum};

use blockjoin_bench::harness::{
    correctness_check, run_strategy, selection_report, student_major_query, JoinKind, CSV_HEADER,
};
use blockjoin_core::JoinStrategy;

/// Report to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    /// Forced-strategy runs for every size.
    Run,
    /// Compare the rows each strategy returns.
    Correctness,
    /// Show the candidates the automatic planner compared.
    Selection,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

/// Blockjoin join strategy benchmarks
#[derive(Parser, Debug)]
#[command(name = "blockjoin-bench")]
#[command(version, about = "Join strategy benchmarks")]
struct Args {
    /// Report to produce
    #[arg(long, default_value = "run", value_enum)]
    report: Report,

    /// Student counts to run with
    #[arg(long, value_delimiter = ',', default_value = "200,600,1000,1400,2000")]
    sizes: Vec<usize>,

    /// Join on `mid < majorid` instead of `mid = majorid`
    #[arg(long)]
    less_than: bool,

    /// Do not create indexes on the join fields
    #[arg(long)]
    no_index: bool,

    /// Strategies to run (index, nested-block, product, merge); all by default
    #[arg(long, value_delimiter = ',')]
    strategy: Vec<JoinStrategy>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    format: OutputFormat,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blockjoin_bench=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match args.report {
        Report::Run => run_mode(&args),
        Report::Correctness => correctness_mode(&args),
        Report::Selection => selection_mode(&args),
    }
}

fn run_mode(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let kind = if args.less_than {
        JoinKind::LessThan
    } else {
        JoinKind::Equal
    };
    let strategies = if args.strategy.is_empty() {
        vec![
            JoinStrategy::Index,
            JoinStrategy::NestedBlock,
            JoinStrategy::Product,
            JoinStrategy::Merge,
        ]
    } else {
        args.strategy.clone()
    };
    let query = student_major_query(kind.predicate());

    let mut results = Vec::new();
    for &size in &args.sizes {
        for &strategy in &strategies {
            results.push(run_strategy(size, &query, strategy, !args.no_index)?);
        }
    }

    match args.format {
        OutputFormat::Text => {
            println!("---FINAL RESULTS---");
            for r in &results {
                println!("{}", r.to_text());
            }
        }
        OutputFormat::Csv => {
            println!("{}", CSV_HEADER);
            for r in results.iter().filter(|r| r.possible()) {
                println!("{}", r.csv_row());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }
    Ok(())
}

fn correctness_mode(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let size = args.sizes.first().copied().unwrap_or(200);
    let reports = vec![
        correctness_check(size, JoinKind::Equal)?,
        correctness_check(size, JoinKind::LessThan)?,
    ];

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => {
            for r in &reports {
                let outcome = if r.passed() { "passed" } else { "failed" };
                println!(
                    "{:?} join over {:?}: {} ({} records, {} mismatched rows)",
                    r.kind, r.strategies, outcome, r.records, r.mismatches
                );
            }
        }
    }

    if reports.iter().all(|r| r.passed()) {
        Ok(())
    } else {
        Err("strategies returned different rows".into())
    }
}

fn selection_mode(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let size = args.sizes.first().copied().unwrap_or(200);
    let cases = selection_report(size)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cases)?),
        _ => {
            for case in &cases {
                println!("{}", case.to_text());
            }
        }
    }
    Ok(())
}
