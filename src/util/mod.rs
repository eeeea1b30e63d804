//! Process-level helpers for the server binary.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`sig_down`] | Graceful shutdown on SIGTERM / SIGINT |
//! | [`telemetry`] | `tracing` subscriber setup, OpenTelemetry export behind the `telemetry` feature |

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
