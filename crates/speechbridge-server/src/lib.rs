//! HTTP server for the SpeechBridge dashboard.
//!
//! Exposes the pipeline stages, diagnostics, and live worker control as a
//! JSON API and serves the embedded dashboard from `speechbridge-web`.

pub mod diagnostics;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{router, start_server};
pub use state::{AppState, Services, WorkerCommand};
