//! Command handlers. Each prints its result as JSON on stdout.

pub mod stats;
pub mod stream;
pub mod trace;

use anyhow::Context;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse an inline JSON argument, or the file it names when prefixed with `@`.
pub fn read_json_arg(arg: &str) -> anyhow::Result<serde_json::Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("argument is not valid JSON")
}
