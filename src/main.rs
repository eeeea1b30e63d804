//! SMM panel HTTP entrypoint.
//!
//! Runs the storefront API: accounts, catalog, orders forwarded to upstream providers,
//! balance top-ups and support tickets.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` points at the JSON config file (default `config.json`)
//! - `RUST_LOG` controls log filtering
//! - `OTEL_*` variables enable OTLP export when built with the `telemetry` feature

use std::process;

use smm_panel::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1)
    }
}
