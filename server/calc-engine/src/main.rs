//! Binary entrypoint: read one calc request from stdin, write the table to stdout.
//!
//! The request is a `CalcInput` JSON object. On success the output is the
//! `RegionCalcTable` (not-computed values as `null`); on invalid input it is an
//! `ErrorOutput` line and the exit code is 1. Logs go to stderr (`RUST_LOG`).

use std::io::{self, Read, Write};
use std::sync::Arc;

use calc_engine::types::{CalcInput, ErrorOutput};
use calc_engine::{build, CalcError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  if let Err(e) = run_binary() {
    error!(error = %e, "calc request failed");
    let mut out = ErrorOutput::new(e.to_string());
    if let Some(field) = e.field() {
      out = out.with_field(field);
    }
    let mut stdout = io::stdout().lock();
    let _ = serde_json::to_writer(&mut stdout, &out);
    let _ = writeln!(stdout);
    std::process::exit(1);
  }
}

fn run_binary() -> Result<(), CalcError> {
  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw)?;
  let input: CalcInput = serde_json::from_str(&raw)?;
  let (raw_table, parms, thresholds) = input.into_parts()?;
  info!(regions = raw_table.regions().len(), days = raw_table.days(), "calc request");

  let out = build(Arc::new(raw_table), &parms, &thresholds);
  let mut stdout = io::stdout().lock();
  serde_json::to_writer(&mut stdout, &out)?;
  writeln!(stdout)?;
  Ok(())
}
