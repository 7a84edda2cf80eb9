//! Orchestrator - run configuration, the event loop, and parallel sweeps
//!
//! See `engine.rs` for the event loop and `sweep.rs` for fanning runs out
//! over threads.

pub mod config;
pub mod engine;
pub mod sweep;

// Re-export main types for convenience
pub use config::{ConfigError, NetworkConfig};
pub use engine::{run, SimulationError, Simulator, StopReason};
pub use sweep::{
    plan, run_many, run_pairs, run_requests, RunError, RunFailure, RunReport, RunRequest,
    SweepError, SweepOptions,
};
