//! Per-node traffic sources.
//!
//! Each node owns one source: a sampler for the gap until its next packet
//! and a separate stream for choosing the packet's destination. Sources are
//! independent, so adding a node never perturbs the traffic of the others.
//!
//! # Example
//!
//! ```
//! use ringsim_core::arrivals::ArrivalGenerator;
//! use ringsim_core::Distribution;
//!
//! let law = Distribution::Exponential { rate: 1.0 };
//! let mut generator = ArrivalGenerator::new(4, &law, None, 42).unwrap();
//!
//! let gap = generator.next_interarrival(0).unwrap();
//! let packet = generator.generate(0, gap).unwrap();
//! assert_eq!(packet.source(), 0);
//! assert_ne!(packet.destination(), 0);
//! assert_eq!(generator.generated(), 1);
//! ```

use crate::core::time::SimTime;
use crate::models::packet::{NodeId, Packet, PacketId};
use crate::rng::{Distribution, DistributionError, RngManager, Sampler, StreamKind};

/// Random state of one node's traffic
#[derive(Debug, Clone)]
struct TrafficSource {
    interarrival: Sampler,
    destinations: RngManager,
}

/// Generator for packet arrivals across all nodes
#[derive(Debug, Clone)]
pub struct ArrivalGenerator {
    sources: Vec<TrafficSource>,

    /// Destination weights indexed by node; uniform when absent
    weights: Option<Vec<f64>>,

    next_packet_id: PacketId,
}

impl ArrivalGenerator {
    /// Build one source per node, all drawing interarrival gaps from `law`
    pub fn new(
        node_count: usize,
        law: &Distribution,
        weights: Option<Vec<f64>>,
        seed: u64,
    ) -> Result<Self, DistributionError> {
        let sources = (0..node_count)
            .map(|node| {
                Ok(TrafficSource {
                    interarrival: Sampler::new(
                        law.clone(),
                        RngManager::derive(seed, node, StreamKind::Arrival),
                    )?,
                    destinations: RngManager::derive(seed, node, StreamKind::Destination),
                })
            })
            .collect::<Result<Vec<_>, DistributionError>>()?;

        Ok(Self {
            sources,
            weights,
            next_packet_id: 0,
        })
    }

    pub fn node_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of packets generated so far
    pub fn generated(&self) -> u64 {
        self.next_packet_id
    }

    /// Gap until `node` generates its next packet
    pub fn next_interarrival(&mut self, node: NodeId) -> Option<SimTime> {
        self.sources
            .get_mut(node)
            .map(|source| source.interarrival.sample())
    }

    /// Create the packet `node` generates at `now`
    pub fn generate(&mut self, node: NodeId, now: SimTime) -> Option<Packet> {
        let node_count = self.sources.len();
        let source = self.sources.get_mut(node)?;
        let destination =
            select_destination(node, node_count, self.weights.as_deref(), &mut source.destinations)?;

        let id = self.next_packet_id;
        self.next_packet_id += 1;
        Some(Packet::new(id, node, destination, now))
    }
}

/// Pick a destination other than `source`, uniformly or by weight
fn select_destination(
    source: NodeId,
    node_count: usize,
    weights: Option<&[f64]>,
    rng: &mut RngManager,
) -> Option<NodeId> {
    let candidates: Vec<NodeId> = (0..node_count).filter(|&n| n != source).collect();
    if candidates.is_empty() {
        return None;
    }

    let weight_of = |n: NodeId| weights.and_then(|w| w.get(n).copied()).unwrap_or(1.0);
    let total: f64 = candidates.iter().map(|&n| weight_of(n)).sum();

    if weights.is_none() || total <= 0.0 {
        let idx = rng.range(0, candidates.len() as i64) as usize;
        return candidates.get(idx).copied();
    }

    let mut target = rng.next_f64() * total;
    for &candidate in &candidates {
        let weight = weight_of(candidate);
        if weight <= 0.0 {
            continue;
        }
        target -= weight;
        if target <= 0.0 {
            return Some(candidate);
        }
    }

    // rounding left a sliver of weight unassigned
    candidates.into_iter().rev().find(|&n| weight_of(n) > 0.0)
}
