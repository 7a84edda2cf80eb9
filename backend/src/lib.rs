//! Ring Simulator Core - WDM ring MAC simulation engine
//!
//! Discrete-event simulator for medium-access protocols on a
//! wavelength-division-multiplexed optical ring, with deterministic
//! execution and parallel parameter sweeps.
//!
//! # Architecture
//!
//! - **core**: Simulated time, clocks, the global event queue, fingerprints
//! - **rng**: Deterministic random streams and statistical laws
//! - **arrivals**: Per-node traffic sources
//! - **models**: Domain types (Packet, Buffer, Node, Event, wavelengths)
//! - **protocol**: Transmitter and receiver state machines (FT_TR, TT_FR)
//! - **orchestrator**: Run configuration, event loop, parallel sweeps
//! - **metrics**: Reduction of a run into a `Summary`
//!
//! # Critical Invariants
//!
//! 1. Dispatched event times never decrease
//! 2. Every generated packet ends delivered or dropped, exactly once
//! 3. All randomness is deterministic (seeded per-node streams)
//!
//! # Example
//!
//! ```rust
//! use ringsim_core::{run, NetworkConfig, Protocol};
//!
//! let mut config = NetworkConfig::new(4, 4, Protocol::FtTr);
//! config.propagation_delay = 0.1;
//! config.horizon = Some(100.0);
//! config.seed = 42;
//!
//! let summary = run(&config).unwrap();
//! assert_eq!(summary.generated, summary.delivered + summary.dropped);
//! ```

// Module declarations
pub mod arrivals;
pub mod core;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod protocol;
pub mod rng;

// Re-exports for convenience
pub use crate::core::time::{CausalityViolation, Clock, ClockDomain, SimTime};
pub use metrics::{DropCounts, EventCounts, Summary};
pub use models::{
    buffer::{Buffer, Enqueue},
    event::{Event, EventKind, EventLog, EventRecord, EventTag},
    packet::{DropReason, NodeId, Packet, PacketError, PacketId, PacketStatus, Wavelength},
};
pub use orchestrator::{
    run, run_many, run_pairs, ConfigError, NetworkConfig, RunError, RunReport, SimulationError,
    Simulator, StopReason, SweepOptions,
};
pub use protocol::{ContentionPolicy, Protocol, Role, Side};
pub use rng::{Distribution, DistributionError, RngManager, Sampler, StreamKind};
