mod loader;

use std::path::PathBuf;

use branchwise_solver::{Method, Outcome, SolutionStatus, Solver, Traversal};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::loader::{CliError, load_model};

#[derive(Parser)]
#[command(name = "branchwise")]
#[command(about = "Simplex and branch-and-bound solver with full solve traces", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a JSON model and print the result
    Solve {
        /// The model file
        file: PathBuf,
        /// Engine to use
        #[arg(short, long, value_enum, default_value = "auto")]
        method: MethodArg,
        /// Order in which search nodes are explored
        #[arg(short, long, value_enum, default_value = "breadth-first")]
        traversal: TraversalArg,
        /// Tolerance for floating point comparisons
        #[arg(long, default_value_t = 1e-9)]
        tolerance: f64,
        /// Maximum simplex pivots per solve
        #[arg(long, default_value_t = 10000)]
        max_iterations: usize,
        /// Maximum search nodes before giving up
        #[arg(long)]
        node_limit: Option<usize>,
        /// Leave tableau snapshots out of the trace
        #[arg(long)]
        no_snapshots: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
    },
    /// Check a JSON model for errors
    Check {
        /// The model file
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Auto,
    Simplex,
    BranchAndBound,
    Knapsack,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Auto => Method::Auto,
            MethodArg::Simplex => Method::Simplex,
            MethodArg::BranchAndBound => Method::BranchAndBound,
            MethodArg::Knapsack => Method::Knapsack,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TraversalArg {
    BreadthFirst,
    DepthFirst,
}

impl From<TraversalArg> for Traversal {
    fn from(arg: TraversalArg) -> Self {
        match arg {
            TraversalArg::BreadthFirst => Traversal::BreadthFirst,
            TraversalArg::DepthFirst => Traversal::DepthFirst,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(serde::Serialize)]
struct ErrorReport {
    status: SolutionStatus,
    message: String,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Commands::Solve {
            file,
            method,
            traversal,
            tolerance,
            max_iterations,
            node_limit,
            no_snapshots,
            format,
        } => {
            let solver = Solver::new()
                .with_method(method.into())
                .with_traversal(traversal.into())
                .with_tolerance(tolerance)
                .with_max_iterations(max_iterations)
                .with_node_limit(node_limit)
                .with_snapshots(!no_snapshots);

            let result =
                load_model(&file).and_then(|model| solver.solve(&model).map_err(CliError::from));
            match (result, format) {
                (Ok(outcome), Format::Json) => print_json(&outcome),
                (Ok(outcome), Format::Pretty) => print_pretty(&outcome),
                (Err(e), Format::Json) => {
                    print_json(&ErrorReport {
                        status: SolutionStatus::Error,
                        message: e.to_string(),
                    });
                    std::process::exit(1);
                }
                (Err(e), Format::Pretty) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Check { file } => match load_model(&file) {
            Ok(model) => {
                let integral = model.variables.iter().filter(|v| v.kind.is_integral()).count();
                println!("✓ {} is valid", file.display());
                println!("  {} variables ({} integral)", model.num_variables(), integral);
                println!("  {} constraints", model.num_constraints());
                println!("  method: {:?}", Solver::new().resolve_method(&model));
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file.display());
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        },
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_pretty(outcome: &Outcome) {
    println!("Status: {}", outcome.status().to_string().to_uppercase());
    if let Some(objective) = outcome.objective_value() {
        println!("Objective: {:.4}", objective);
    }
    if !outcome.assignment().is_empty() {
        println!();
        println!("Variables:");
        for (name, value) in outcome.assignment() {
            println!("  {:20} {:12.4}", name, value);
        }
    }
    println!();

    match outcome {
        Outcome::Linear(solution) => {
            println!("Pivots: {}", solution.iterations);
            for step in &solution.trace.pivots {
                println!("  {}", step);
            }
        }
        Outcome::Search(result) => {
            println!(
                "Nodes: {} explored, {} fathomed, {} branched (max depth {})",
                result.explored_nodes,
                result.fathomed_nodes,
                result.branched_nodes,
                result.max_depth
            );
            if let Some(bound) = result.root_bound {
                println!("Root bound: {:.4}", bound);
            }
            for update in &result.incumbents {
                println!("  incumbent {:.4} at node {}", update.objective, update.node);
            }
        }
    }

    if outcome.status() != SolutionStatus::Optimal {
        std::process::exit(1);
    }
}
