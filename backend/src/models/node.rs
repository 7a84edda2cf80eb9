//! Ring node model
//!
//! A node is one ring position: its transmit buffer, both endpoint state
//! machines, and the random streams its endpoints draw from. Nothing in a
//! node is shared with any other node.

use crate::models::buffer::Buffer;
use crate::models::packet::{NodeId, Wavelength};
use crate::protocol::{Protocol, Receiver, Transmitter};
use crate::rng::{Distribution, DistributionError, RngManager, Sampler, StreamKind};

/// Construction parameters shared by every node of a run
#[derive(Debug, Clone, Copy)]
pub struct NodeSpec<'a> {
    pub protocol: Protocol,
    pub buffer_capacity: usize,
    pub tuning: &'a Distribution,
    pub backoff: &'a Distribution,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    home_wavelength: Wavelength,
    pub buffer: Buffer,
    pub transmitter: Transmitter,
    pub receiver: Receiver,
    /// Durations of tuning operations, whichever side tunes
    pub tuning: Sampler,
    /// Contention backoff delays for both endpoints
    pub backoff: Sampler,
}

impl Node {
    pub fn new(id: NodeId, home_wavelength: Wavelength, spec: NodeSpec<'_>) -> Result<Self, DistributionError> {
        let (tx_role, rx_role) = spec.protocol.roles(home_wavelength);
        Ok(Self {
            id,
            home_wavelength,
            buffer: Buffer::new(spec.buffer_capacity),
            transmitter: Transmitter::new(id, tx_role),
            receiver: Receiver::new(id, rx_role),
            tuning: Sampler::new(
                spec.tuning.clone(),
                RngManager::derive(spec.seed, id, StreamKind::Tuning),
            )?,
            backoff: Sampler::new(
                spec.backoff.clone(),
                RngManager::derive(spec.seed, id, StreamKind::Backoff),
            )?,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn home_wavelength(&self) -> Wavelength {
        self.home_wavelength
    }
}
