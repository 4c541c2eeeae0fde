//! evtel — operator CLI for evaluation telemetry.

mod cli;
mod commands;
mod state;

use anyhow::Context;
use clap::Parser;
use cli::{BenchmarkCommands, Cli, Commands, ReportCommands, StatsCommands};
use ev_core::config::TelemetryConfig;
use state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => TelemetryConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TelemetryConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    let state = AppState::open(config)?;
    dispatch(&state, cli.command).await
}

async fn dispatch(state: &AppState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Watch {
            url,
            body,
            no_complete,
        } => commands::stream::watch(state, &url, body.as_deref(), no_complete).await,
        Commands::Run {
            url,
            benchmark,
            run,
            body,
        } => commands::stream::run(state, &url, &benchmark, &run, body.as_deref()).await,
        Commands::ImportSpans { file } => commands::trace::import_spans(state, &file),
        Commands::Traces(args) => commands::trace::traces(state, &args),
        Commands::Tree { trace_id } => commands::trace::tree(state, &trace_id),
        Commands::Report {
            command: ReportCommands::Put { json, benchmark },
        } => commands::stats::put_report(state, &json, benchmark.as_deref()).await,
        Commands::Benchmark { command } => match command {
            BenchmarkCommands::Put { json } => commands::stats::put_benchmark(state, &json).await,
            BenchmarkCommands::Get { benchmark } => {
                commands::stats::get_benchmark(state, &benchmark).await
            }
        },
        Commands::Stats { command } => match command {
            StatsCommands::Get { benchmark, run } => {
                commands::stats::get(state, &benchmark, &run).await
            }
            StatsCommands::Refresh { benchmark, run } => {
                commands::stats::refresh(state, &benchmark, run.as_deref()).await
            }
            StatsCommands::Patch {
                benchmark,
                run,
                json,
            } => commands::stats::patch(state, &benchmark, &run, &json).await,
        },
    }
}
