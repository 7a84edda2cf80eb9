//! Packet model
//!
//! Represents one data packet travelling from a source node to a destination
//! node over the ring. Each packet has:
//! - Source and destination node IDs
//! - Arrival time (when the traffic source generated it)
//! - Service start (when its transmission began)
//! - The wavelength it was sent on
//! - Status (Pending, Delivered, Dropped)
//!
//! CRITICAL: a packet reaches exactly one terminal status and never leaves it.

use crate::core::time::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Index of a node on the ring
pub type NodeId = usize;

/// Index of a wavelength (optical channel)
pub type Wavelength = usize;

/// Sequential packet identifier, unique within a run
pub type PacketId = u64;

/// Why a packet was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Source buffer was full on arrival
    BufferOverflow,
    /// Arrived on a wavelength a fixed receiver cannot listen to
    ProtocolMismatch,
    /// Lost wavelength contention under the drop policy
    Contention,
    /// Still in the system when the run stopped
    Truncated,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DropReason::BufferOverflow => "buffer overflow",
            DropReason::ProtocolMismatch => "protocol mismatch",
            DropReason::Contention => "contention",
            DropReason::Truncated => "truncated",
        };
        f.write_str(label)
    }
}

/// Packet status
///
/// Tracks the lifecycle of a packet through the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PacketStatus {
    /// Packet generated, not yet delivered or dropped
    Pending,

    /// Packet accepted by its destination receiver
    Delivered {
        /// Time of delivery
        completion_time: SimTime,
    },

    /// Packet discarded
    Dropped {
        reason: DropReason,
        /// Time the drop was recorded
        time: SimTime,
    },
}

/// Errors that can occur during packet state transitions
#[derive(Debug, Error, PartialEq)]
pub enum PacketError {
    #[error("packet {id} already has a terminal status")]
    AlreadyTerminal { id: PacketId },

    #[error("packet {id} is still pending")]
    NotTerminal { id: PacketId },

    #[error("packet {id} completed at {time} before it arrived at {arrival_time}")]
    CompletionBeforeArrival {
        id: PacketId,
        time: SimTime,
        arrival_time: SimTime,
    },
}

/// A data packet
///
/// # Example
/// ```
/// use ringsim_core::Packet;
///
/// let mut packet = Packet::new(0, 1, 3, 10.0);
/// packet.begin_service(12.0, 2);
/// packet.deliver(15.5).unwrap();
///
/// assert_eq!(packet.transfer_delay(), Some(5.5));
/// assert_eq!(packet.queueing_delay(), Some(2.0));
/// assert!(packet.deliver(16.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Sequential identifier
    id: PacketId,

    /// Node that generated the packet
    source: NodeId,

    /// Node the packet is addressed to
    destination: NodeId,

    /// Time the packet was generated
    arrival_time: SimTime,

    /// Time the first transmission attempt went on the air
    service_start: Option<SimTime>,

    /// Wavelength the packet was transmitted on
    wavelength: Option<Wavelength>,

    /// Current status
    status: PacketStatus,
}

impl Packet {
    /// Create a new pending packet
    pub fn new(id: PacketId, source: NodeId, destination: NodeId, arrival_time: SimTime) -> Self {
        Self {
            id,
            source,
            destination,
            arrival_time,
            service_start: None,
            wavelength: None,
            status: PacketStatus::Pending,
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn arrival_time(&self) -> SimTime {
        self.arrival_time
    }

    pub fn service_start(&self) -> Option<SimTime> {
        self.service_start
    }

    pub fn wavelength(&self) -> Option<Wavelength> {
        self.wavelength
    }

    pub fn status(&self) -> &PacketStatus {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, PacketStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.status, PacketStatus::Delivered { .. })
    }

    /// Drop reason, if the packet was dropped
    pub fn drop_reason(&self) -> Option<DropReason> {
        match self.status {
            PacketStatus::Dropped { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Delivery time, if delivered
    pub fn completion_time(&self) -> Option<SimTime> {
        match self.status {
            PacketStatus::Delivered { completion_time } => Some(completion_time),
            _ => None,
        }
    }

    /// `completion_time - arrival_time` for delivered packets
    pub fn transfer_delay(&self) -> Option<SimTime> {
        self.completion_time().map(|t| t - self.arrival_time)
    }

    /// `service_start - arrival_time` once transmission has begun
    pub fn queueing_delay(&self) -> Option<SimTime> {
        self.service_start.map(|t| t - self.arrival_time)
    }

    /// Record that the packet went on the air on `wavelength`
    ///
    /// Only the first call sets the service start.
    pub fn begin_service(&mut self, now: SimTime, wavelength: Wavelength) {
        if self.service_start.is_none() {
            self.service_start = Some(now);
        }
        self.wavelength = Some(wavelength);
    }

    /// Mark the packet delivered at `now`
    pub fn deliver(&mut self, now: SimTime) -> Result<(), PacketError> {
        self.ensure_pending()?;
        if now < self.arrival_time {
            return Err(PacketError::CompletionBeforeArrival {
                id: self.id,
                time: now,
                arrival_time: self.arrival_time,
            });
        }
        self.status = PacketStatus::Delivered {
            completion_time: now,
        };
        Ok(())
    }

    /// Mark the packet dropped at `now`
    pub fn drop_with(&mut self, reason: DropReason, now: SimTime) -> Result<(), PacketError> {
        self.ensure_pending()?;
        self.status = PacketStatus::Dropped { reason, time: now };
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), PacketError> {
        if self.is_terminal() {
            return Err(PacketError::AlreadyTerminal { id: self.id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_packet_is_pending() {
        let packet = Packet::new(7, 0, 1, 3.0);
        assert!(packet.is_pending());
        assert_eq!(packet.transfer_delay(), None);
        assert_eq!(packet.queueing_delay(), None);
    }

    #[test]
    fn test_cannot_drop_delivered_packet() {
        let mut packet = Packet::new(1, 0, 1, 0.0);
        packet.deliver(1.0).unwrap();
        assert_eq!(
            packet.drop_with(DropReason::Truncated, 2.0),
            Err(PacketError::AlreadyTerminal { id: 1 })
        );
        assert!(packet.is_delivered());
    }

    #[test]
    fn test_cannot_deliver_dropped_packet() {
        let mut packet = Packet::new(2, 0, 1, 0.0);
        packet.drop_with(DropReason::BufferOverflow, 0.0).unwrap();
        assert!(packet.deliver(1.0).is_err());
        assert_eq!(packet.drop_reason(), Some(DropReason::BufferOverflow));
    }

    #[test]
    fn test_delivery_before_arrival_rejected() {
        let mut packet = Packet::new(3, 0, 1, 5.0);
        assert!(matches!(
            packet.deliver(4.0),
            Err(PacketError::CompletionBeforeArrival { .. })
        ));
        assert!(packet.is_pending());
    }

    #[test]
    fn test_service_start_kept_across_retries() {
        let mut packet = Packet::new(4, 0, 1, 0.0);
        packet.begin_service(2.0, 1);
        packet.begin_service(5.0, 3);
        assert_eq!(packet.service_start(), Some(2.0));
        assert_eq!(packet.wavelength(), Some(3));
    }
}
