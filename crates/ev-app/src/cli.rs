//! Command-line definitions for `evtel`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Evaluation telemetry: watch agent runs, inspect traces, keep run stats honest.
///
/// Results are printed as JSON on stdout; logs go to stderr (see RUST_LOG).
#[derive(Parser, Debug)]
#[command(name = "evtel", author, version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file. A missing file means built-in defaults.
    #[arg(short, long, global = true, env = "EVTEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the storage directory from the configuration.
    #[arg(long, global = true, env = "EVTEL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream events from an agent endpoint, one JSON line per event
    Watch {
        url: String,
        /// Request body (JSON, or @file)
        #[arg(long)]
        body: Option<String>,
        /// Keep reading after RUN_FINISHED / RUN_ERROR
        #[arg(long)]
        no_complete: bool,
    },

    /// Execute one benchmark run against an agent and print its trajectory
    Run {
        url: String,
        #[arg(long)]
        benchmark: String,
        #[arg(long)]
        run: String,
        /// Request body (JSON, or @file)
        #[arg(long)]
        body: Option<String>,
    },

    /// Import spans from a JSON array or JSON-lines file
    ImportSpans { file: PathBuf },

    /// Trace summaries and latency buckets for runs, or the spans of one trace
    Traces(TracesArgs),

    /// Span tree of one trace
    Tree { trace_id: String },

    /// Report documents
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },

    /// Benchmark documents
    Benchmark {
        #[command(subcommand)]
        command: BenchmarkCommands,
    },

    /// Run statistics
    Stats {
        #[command(subcommand)]
        command: StatsCommands,
    },
}

#[derive(Args, Debug)]
pub struct TracesArgs {
    /// Run id (repeatable)
    #[arg(long = "run", conflicts_with = "trace", required_unless_present = "trace")]
    pub runs: Vec<String>,
    #[arg(long)]
    pub trace: Option<String>,
    /// Only spans with this status (ok, error, unset); applies with --trace
    #[arg(long, requires = "trace")]
    pub status: Option<String>,
    #[arg(long, requires = "trace")]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Insert or replace a report; reconciles the owning run when its metrics finish
    Put {
        /// Report JSON, or @file
        json: String,
        /// Benchmark owning the run that references this report
        #[arg(long)]
        benchmark: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum BenchmarkCommands {
    /// Insert or replace a benchmark document
    Put {
        /// Benchmark JSON, or @file
        json: String,
    },
    /// Print a benchmark with fresh stats for every run
    Get { benchmark: String },
}

#[derive(Subcommand, Debug)]
pub enum StatsCommands {
    /// Read one run with self-healed stats
    Get { benchmark: String, run: String },
    /// Recompute and persist stats for one run, or every run of the benchmark
    Refresh {
        benchmark: String,
        run: Option<String>,
    },
    /// Overwrite stats with explicit counters
    Patch {
        benchmark: String,
        run: String,
        /// {"passed":..,"failed":..,"pending":..,"total":..}, or @file
        json: String,
    },
}
