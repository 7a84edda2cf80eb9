//! Simulation events and the dispatched-event log.
//!
//! An [`Event`] is an immutable instruction for one node's state machines,
//! due at a simulated time. Payload travels inside the [`EventKind`]: a
//! `Receive` event owns the packet it carries until the receiver takes it.
//!
//! # Event Types
//!
//! - **Arrival**: the node's traffic source generates a packet (data clock)
//! - **TransmitStart / TransmitEnd**: a transmitter occupies a wavelength (data clock)
//! - **TuneStart / TuneEnd**: a tunable endpoint retunes (control clock)
//! - **Receive**: a packet reaches its destination receiver (data clock)
//!
//! # Example
//!
//! ```rust
//! use ringsim_core::models::event::{EventKind, EventTag};
//! use ringsim_core::core::time::ClockDomain;
//! use ringsim_core::protocol::Side;
//!
//! let kind = EventKind::TuneStart { side: Side::Receiver };
//! assert_eq!(kind.tag(), EventTag::TuneStart);
//! assert_eq!(kind.domain(), ClockDomain::Control);
//! ```

use crate::core::time::{ClockDomain, SimTime};
use crate::models::packet::{NodeId, Packet, PacketId, Wavelength};
use crate::protocol::Side;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an event asks its actor to do, with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Traffic source generates the next packet
    Arrival,

    /// Transmitter attempts to put its packet on the air
    TransmitStart,

    /// Transmitter finished sending its packet
    TransmitEnd,

    /// Tunable endpoint begins retuning
    TuneStart { side: Side },

    /// Tunable endpoint finished retuning
    TuneEnd { side: Side },

    /// Packet reaches the receiver on the given wavelength
    Receive {
        packet: Packet,
        wavelength: Wavelength,
    },
}

impl EventKind {
    /// Payload-free label of this kind
    pub fn tag(&self) -> EventTag {
        match self {
            EventKind::Arrival => EventTag::Arrival,
            EventKind::TransmitStart => EventTag::TransmitStart,
            EventKind::TransmitEnd => EventTag::TransmitEnd,
            EventKind::TuneStart { .. } => EventTag::TuneStart,
            EventKind::TuneEnd { .. } => EventTag::TuneEnd,
            EventKind::Receive { .. } => EventTag::Receive,
        }
    }

    /// Clock domain this event advances
    pub fn domain(&self) -> ClockDomain {
        match self {
            EventKind::TuneStart { .. } | EventKind::TuneEnd { .. } => ClockDomain::Control,
            _ => ClockDomain::Data,
        }
    }

    /// Packet carried by this event, if any
    pub fn packet(&self) -> Option<&Packet> {
        match self {
            EventKind::Receive { packet, .. } => Some(packet),
            _ => None,
        }
    }
}

/// Event kind without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    Arrival,
    TransmitStart,
    TransmitEnd,
    TuneStart,
    TuneEnd,
    Receive,
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventTag::Arrival => "arrival",
            EventTag::TransmitStart => "transmit_start",
            EventTag::TransmitEnd => "transmit_end",
            EventTag::TuneStart => "tune_start",
            EventTag::TuneEnd => "tune_end",
            EventTag::Receive => "receive",
        };
        f.write_str(label)
    }
}

/// A scheduled event
///
/// Built only by the event queue, which assigns the insertion sequence used
/// to break ties between simultaneous events.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    time: SimTime,
    sequence: u64,
    actor: NodeId,
    kind: EventKind,
}

impl Event {
    pub(crate) fn new(time: SimTime, sequence: u64, actor: NodeId, kind: EventKind) -> Self {
        Self {
            time,
            sequence,
            actor,
            kind,
        }
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Node whose state machines handle this event
    pub fn actor(&self) -> NodeId {
        self.actor
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Payload-free summary of this event
    pub fn record(&self) -> EventRecord {
        EventRecord {
            time: self.time,
            sequence: self.sequence,
            actor: self.actor,
            tag: self.kind.tag(),
            packet_id: self.kind.packet().map(Packet::id),
        }
    }

    /// Split into `(time, actor, kind)` for dispatch
    pub fn into_parts(self) -> (SimTime, NodeId, EventKind) {
        (self.time, self.actor, self.kind)
    }
}

/// What the engine remembers about a dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: SimTime,
    pub sequence: u64,
    pub actor: NodeId,
    pub tag: EventTag,
    pub packet_id: Option<PacketId>,
}

/// Log of dispatched events, in dispatch order.
///
/// This is a simple wrapper around `Vec<EventRecord>` with query helpers.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn log(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records handled by one node
    pub fn records_for_actor(&self, actor: NodeId) -> Vec<&EventRecord> {
        self.records.iter().filter(|r| r.actor == actor).collect()
    }

    /// Records of one kind
    pub fn records_of_kind(&self, tag: EventTag) -> Vec<&EventRecord> {
        self.records.iter().filter(|r| r.tag == tag).collect()
    }

    /// Records that carried a given packet
    pub fn records_for_packet(&self, packet_id: PacketId) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.packet_id == Some(packet_id))
            .collect()
    }

    /// True if dispatch times never decrease
    pub fn is_causal(&self) -> bool {
        self.records.windows(2).all(|pair| pair[0].time <= pair[1].time)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
