//! # vitals-sim - BioHarness Vitals Simulator service
//!
//! REST control surface, Prometheus metrics and logging bootstrap around the
//! [`vitals_core`] generation-and-delivery pipeline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        vitals-sim                           │
//! │                                                             │
//! │   axum Router ──▶ api::handle_* ──▶ SimulationEngine        │
//! │   (server.rs)     (blocking pool)    │                      │
//! │                                      ├── LoggingSink        │
//! │   GET /metrics ◀── metrics.rs ◀──────┼── MetricsSink        │
//! │                                      └── Broadcaster ──▶ HTTP│
//! └─────────────────────────────────────────────────────────────┘
//! ```

// HTTP Control API
pub mod api;

// axum adapter
pub mod server;

pub mod logging;
pub mod metrics;

pub use api::{ApiResponse, AppState, SharedState, create_shared_state};
pub use server::{router, serve};
