//! Run statistics
//!
//! [`MetricsCollector`] is fed every generated packet and every packet that
//! reaches a terminal status; it never mutates packets. When the run stops
//! it is reduced, together with the endpoint and wavelength records, into a
//! serializable [`Summary`].
//!
//! # Figures
//!
//! - `throughput = delivered / simulated_duration`
//! - `mean_transfer_delay = sum(completion - arrival) / delivered`, absent
//!   when nothing was delivered
//! - `mean_queueing_delay` over packets that went on the air

pub mod analysis;

use crate::core::digest;
use crate::core::time::SimTime;
use crate::models::channel::WavelengthChannels;
use crate::models::event::EventTag;
use crate::models::node::Node;
use crate::models::packet::{DropReason, NodeId, Packet, PacketError, PacketStatus, Wavelength};
use crate::orchestrator::engine::StopReason;
use crate::protocol::{EndpointStats, Protocol};
use analysis::DelayEstimate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dropped packets by reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DropCounts {
    pub buffer_overflow: u64,
    pub protocol_mismatch: u64,
    pub contention: u64,
    pub truncated: u64,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::BufferOverflow => self.buffer_overflow += 1,
            DropReason::ProtocolMismatch => self.protocol_mismatch += 1,
            DropReason::Contention => self.contention += 1,
            DropReason::Truncated => self.truncated += 1,
        }
    }

    pub fn get(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::BufferOverflow => self.buffer_overflow,
            DropReason::ProtocolMismatch => self.protocol_mismatch,
            DropReason::Contention => self.contention,
            DropReason::Truncated => self.truncated,
        }
    }

    pub fn total(&self) -> u64 {
        self.buffer_overflow + self.protocol_mismatch + self.contention + self.truncated
    }
}

/// Dispatched events by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCounts {
    pub arrival: u64,
    pub transmit_start: u64,
    pub transmit_end: u64,
    pub tune_start: u64,
    pub tune_end: u64,
    pub receive: u64,
}

impl EventCounts {
    pub fn record(&mut self, tag: EventTag) {
        match tag {
            EventTag::Arrival => self.arrival += 1,
            EventTag::TransmitStart => self.transmit_start += 1,
            EventTag::TransmitEnd => self.transmit_end += 1,
            EventTag::TuneStart => self.tune_start += 1,
            EventTag::TuneEnd => self.tune_end += 1,
            EventTag::Receive => self.receive += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.arrival
            + self.transmit_start
            + self.transmit_end
            + self.tune_start
            + self.tune_end
            + self.receive
    }
}

/// Per-node traffic figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node: NodeId,
    pub home_wavelength: Wavelength,
    /// Packets this node generated
    pub generated: u64,
    /// Packets from this node that reached their destination
    pub delivered: u64,
    /// Packets from this node that were dropped
    pub dropped: u64,
    /// Packets delivered to this node
    pub received: u64,
    pub peak_buffer: usize,
    pub transmitter: EndpointStats,
    pub receiver: EndpointStats,
}

/// Usage of one wavelength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavelengthSummary {
    pub wavelength: Wavelength,
    pub transmissions: u64,
    pub busy_time: SimTime,
    /// Fraction of the simulated duration the wavelength was busy
    pub utilisation: f64,
}

/// Deliveries between one source and one destination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairLatency {
    pub source: NodeId,
    pub destination: NodeId,
    pub count: u64,
    /// Mean transfer delay
    pub mean: SimTime,
}

/// Mean transfer delay per (source, destination) pair
///
/// Only pairs that saw at least one delivery are listed, sorted by
/// `(source, destination)`, so the size follows the traffic rather than
/// the square of the ring size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyMatrix {
    pub pairs: Vec<PairLatency>,
}

impl LatencyMatrix {
    fn find(&self, source: NodeId, destination: NodeId) -> Option<&PairLatency> {
        self.pairs
            .binary_search_by_key(&(source, destination), |p| (p.source, p.destination))
            .ok()
            .and_then(|index| self.pairs.get(index))
    }

    /// Mean delay from `source` to `destination`, if anything was delivered
    pub fn get(&self, source: NodeId, destination: NodeId) -> Option<SimTime> {
        self.find(source, destination).map(|p| p.mean)
    }

    pub fn count(&self, source: NodeId, destination: NodeId) -> u64 {
        self.find(source, destination).map_or(0, |p| p.count)
    }

    /// Deliveries over all pairs
    pub fn total(&self) -> u64 {
        self.pairs.iter().map(|p| p.count).sum()
    }
}

/// Aggregate statistics of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub protocol: Protocol,
    pub seed: u64,
    pub stop_reason: StopReason,

    pub generated: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub drops: DropCounts,

    pub simulated_duration: SimTime,
    /// Delivered packets per unit of simulated time
    pub throughput: f64,

    pub total_transfer_delay: SimTime,
    pub mean_transfer_delay: Option<SimTime>,
    pub max_transfer_delay: Option<SimTime>,
    pub mean_queueing_delay: Option<SimTime>,
    /// Closed-form prediction for the same configuration
    pub estimate: Option<DelayEstimate>,

    /// Tuning and contention figures summed over all transmitters
    pub transmitter_tuning: EndpointStats,
    /// Tuning and contention figures summed over all receivers
    pub receiver_tuning: EndpointStats,

    pub events: EventCounts,
    pub nodes: Vec<NodeSummary>,
    pub wavelengths: Vec<WavelengthSummary>,
    pub latency: LatencyMatrix,
}

impl Summary {
    /// True if every generated packet is accounted for exactly once
    pub fn is_conserved(&self) -> bool {
        self.generated == self.delivered + self.dropped && self.drops.total() == self.dropped
    }

    /// SHA-256 of the canonical JSON of this summary
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        digest::fingerprint(self)
    }
}

#[derive(Debug, Clone, Default)]
struct NodeCounters {
    generated: u64,
    delivered: u64,
    dropped: u64,
    received: u64,
}

/// Facts about a finished run that live outside the collector
#[derive(Debug)]
pub struct RunFacts<'a> {
    pub protocol: Protocol,
    pub seed: u64,
    pub stop_reason: StopReason,
    pub simulated_duration: SimTime,
    pub nodes: &'a [Node],
    pub channels: &'a WavelengthChannels,
    pub events: EventCounts,
    pub estimate: Option<DelayEstimate>,
}

/// Running totals over generated and terminal packets
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    generated: u64,
    delivered: u64,
    drops: DropCounts,
    total_transfer_delay: SimTime,
    max_transfer_delay: Option<SimTime>,
    total_queueing_delay: SimTime,
    served: u64,
    nodes: Vec<NodeCounters>,
    /// `(delay sum, deliveries)` per `(source, destination)`
    latency: BTreeMap<(NodeId, NodeId), (SimTime, u64)>,
}

impl MetricsCollector {
    pub fn new(node_count: usize) -> Self {
        Self {
            generated: 0,
            delivered: 0,
            drops: DropCounts::default(),
            total_transfer_delay: 0.0,
            max_transfer_delay: None,
            total_queueing_delay: 0.0,
            served: 0,
            nodes: vec![NodeCounters::default(); node_count],
            latency: BTreeMap::new(),
        }
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self) -> u64 {
        self.drops.total()
    }

    pub fn drops(&self) -> &DropCounts {
        &self.drops
    }

    /// Count a freshly generated packet
    pub fn record_generated(&mut self, packet: &Packet) {
        self.generated += 1;
        if let Some(counters) = self.nodes.get_mut(packet.source()) {
            counters.generated += 1;
        }
    }

    /// Fold a packet that reached its terminal status
    pub fn record_terminal(&mut self, packet: &Packet) -> Result<(), PacketError> {
        if let Some(start) = packet.service_start() {
            self.total_queueing_delay += start - packet.arrival_time();
            self.served += 1;
        }

        match packet.status() {
            PacketStatus::Pending => return Err(PacketError::NotTerminal { id: packet.id() }),
            PacketStatus::Delivered { completion_time } => {
                let delay = completion_time - packet.arrival_time();
                self.delivered += 1;
                self.total_transfer_delay += delay;
                self.max_transfer_delay = Some(self.max_transfer_delay.map_or(delay, |m| m.max(delay)));

                let (src, dst) = (packet.source(), packet.destination());
                if let Some(counters) = self.nodes.get_mut(src) {
                    counters.delivered += 1;
                }
                if let Some(counters) = self.nodes.get_mut(dst) {
                    counters.received += 1;
                }
                let (sum, count) = self.latency.entry((src, dst)).or_insert((0.0, 0));
                *sum += delay;
                *count += 1;
            }
            PacketStatus::Dropped { reason, .. } => {
                self.drops.record(*reason);
                if let Some(counters) = self.nodes.get_mut(packet.source()) {
                    counters.dropped += 1;
                }
            }
        }
        Ok(())
    }

    /// Reduce everything into a [`Summary`]
    pub fn summarize(&self, facts: RunFacts<'_>) -> Summary {
        let duration = facts.simulated_duration;
        let per_unit_time = |value: f64| if duration > 0.0 { value / duration } else { 0.0 };

        let mut transmitter_tuning = EndpointStats::default();
        let mut receiver_tuning = EndpointStats::default();
        let nodes = facts
            .nodes
            .iter()
            .zip(&self.nodes)
            .map(|(node, counters)| {
                transmitter_tuning.merge(node.transmitter.stats());
                receiver_tuning.merge(node.receiver.stats());
                NodeSummary {
                    node: node.id(),
                    home_wavelength: node.home_wavelength(),
                    generated: counters.generated,
                    delivered: counters.delivered,
                    dropped: counters.dropped,
                    received: counters.received,
                    peak_buffer: node.buffer.peak_len(),
                    transmitter: *node.transmitter.stats(),
                    receiver: *node.receiver.stats(),
                }
            })
            .collect();

        let wavelengths = (0..facts.channels.len())
            .map(|wavelength| {
                // A transmission still on air counts only up to the cutoff
                let busy_time = facts.channels.busy_time_until(wavelength, duration);
                WavelengthSummary {
                    wavelength,
                    transmissions: facts.channels.transmissions(wavelength),
                    busy_time,
                    // float rounding only
                    utilisation: per_unit_time(busy_time).min(1.0),
                }
            })
            .collect();

        let pairs = self
            .latency
            .iter()
            .map(|(&(source, destination), &(sum, count))| PairLatency {
                source,
                destination,
                count,
                mean: sum / count as f64,
            })
            .collect();

        Summary {
            protocol: facts.protocol,
            seed: facts.seed,
            stop_reason: facts.stop_reason,
            generated: self.generated,
            delivered: self.delivered,
            dropped: self.drops.total(),
            drops: self.drops,
            simulated_duration: duration,
            throughput: per_unit_time(self.delivered as f64),
            total_transfer_delay: self.total_transfer_delay,
            mean_transfer_delay: (self.delivered > 0)
                .then(|| self.total_transfer_delay / self.delivered as f64),
            max_transfer_delay: self.max_transfer_delay,
            mean_queueing_delay: (self.served > 0)
                .then(|| self.total_queueing_delay / self.served as f64),
            estimate: facts.estimate,
            transmitter_tuning,
            receiver_tuning,
            events: facts.events,
            nodes,
            wavelengths,
            latency: LatencyMatrix { pairs },
        }
    }
}
