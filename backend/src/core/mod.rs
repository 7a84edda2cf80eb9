//! Simulation kernel primitives: clocks, the global event queue and
//! deterministic fingerprints.

pub mod digest;
pub mod event_queue;
pub mod time;
