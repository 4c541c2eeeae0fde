//! Agent stream commands.

use super::{print_json, read_json_arg};
use crate::state::AppState;
use anyhow::Context;
use ev_stream::{http_client, EventStream, StreamOptions};

/// Print each event as one JSON line until the stream completes. Ctrl-C
/// aborts the session cleanly.
pub async fn watch(
    state: &AppState,
    url: &str,
    body: Option<&str>,
    no_complete: bool,
) -> anyhow::Result<()> {
    let config = &state.orchestrator.config().stream;
    let mut options = StreamOptions::from_config(config).complete_on_run_end(!no_complete);
    if let Some(body) = body {
        options = options.body(read_json_arg(body)?.to_string());
    }

    let stream = EventStream::new(http_client(config)?, url, options);
    let abort = stream.abort_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; aborting stream");
            abort.abort();
        }
    });

    let reason = stream
        .consume(|event| match serde_json::to_string(&event.payload) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "unprintable event"),
        })
        .await
        .with_context(|| format!("streaming from {url}"))?;
    interrupt.abort();

    tracing::info!(%reason, "stream completed");
    Ok(())
}

pub async fn run(
    state: &AppState,
    url: &str,
    benchmark_id: &str,
    run_id: &str,
    body: Option<&str>,
) -> anyhow::Result<()> {
    let request = body.map(read_json_arg).transpose()?;
    let ctx = state
        .orchestrator
        .execute_run(benchmark_id, run_id, url, request.as_ref())
        .await?;
    print_json(&ctx)
}
