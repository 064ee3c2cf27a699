//! Cache Replay
//!
//! Replays a recorded sequence of writes and reads against a fresh in-memory
//! store. Useful for reproducing cache bugs from captured traffic: each read
//! prints its result and partial flag, and the final flat storage is printed
//! once all steps ran.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin cache-replay -- packages/dev-tools/fixtures/book.json
//!
//! # More detail from the cache itself
//! RUST_LOG=graphcache_core=trace cargo run --bin cache-replay -- fixture.json
//! ```
//!
//! # Fixture Format
//!
//! ```json
//! {
//!   "config": { "eventCapacity": 16 },
//!   "steps": [
//!     { "op": "write", "operation": { ... }, "variables": { ... }, "data": { ... } },
//!     { "op": "read", "operation": { ... }, "variables": { ... } }
//!   ]
//! }
//! ```

use anyhow::{bail, Context};
use graphcache_core::{Operation, Store, StoreConfig, Variables};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "cache_replay=info,graphcache_core=debug";

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    config: StoreConfig,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Step {
    Write {
        operation: Operation,
        #[serde(default)]
        variables: Variables,
        data: Value,
    },
    Read {
        operation: Operation,
        #[serde(default)]
        variables: Variables,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: cache-replay <fixture.json>");
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse fixture {}", path.display()))?;

    tracing::info!(
        fixture = %path.display(),
        steps = fixture.steps.len(),
        "Replaying fixture"
    );

    let store = Store::with_config(fixture.config);
    for (index, step) in fixture.steps.iter().enumerate() {
        match step {
            Step::Write {
                operation,
                variables,
                data,
            } => {
                store
                    .write(operation, variables, data)
                    .with_context(|| format!("Step {} failed to write", index))?;
                tracing::info!(step = index, operation = operation.display_name(), "Wrote");
            }
            Step::Read {
                operation,
                variables,
            } => {
                let result = store
                    .read_denormalized(operation, variables)
                    .with_context(|| format!("Step {} failed to read", index))?;
                println!(
                    "# step {} read {} (partial: {})",
                    index,
                    operation.display_name(),
                    result.partial
                );
                println!("{}", serde_json::to_string_pretty(&result.data)?);
            }
        }
    }

    println!("# storage");
    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    Ok(())
}
