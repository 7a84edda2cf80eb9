//! Deterministic random number generation
//!
//! Every random draw in a run (interarrival gaps, destinations, tuning
//! durations, backoff) goes through an [`RngManager`] stream owned by the
//! node that draws it. Streams are derived from the run seed, so one seed
//! fixes the whole run regardless of how many nodes exist.

mod distribution;
mod xorshift;

pub use distribution::{Distribution, DistributionError, Sampler};
pub use xorshift::{RngManager, StreamKind};
