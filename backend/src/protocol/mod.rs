//! Medium-access protocols for the WDM ring
//!
//! # Overview
//!
//! Every node has one transmitter and one receiver. Which of the two is
//! tunable depends on the protocol:
//!
//! - **FT_TR**: transmitters sit on their node's home wavelength; receivers
//!   tune to whatever wavelength the sender used.
//! - **TT_FR**: receivers sit on their node's home wavelength; transmitters
//!   tune to the destination's home wavelength before sending.
//!
//! Both endpoints are state machines driven by the engine. A handler never
//! mutates the event queue directly; it returns [`Action`]s that the engine
//! applies, so ownership of a packet always moves along with an action.

mod receiver;
mod transmitter;

pub use receiver::Receiver;
pub use transmitter::Transmitter;

use crate::core::time::SimTime;
use crate::models::channel::{ChannelError, WavelengthChannels};
use crate::models::event::{EventKind, EventTag};
use crate::models::packet::{NodeId, Packet, PacketError, PacketId, Wavelength};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Channel-assignment discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    /// Fixed transmitter, tunable receiver
    FtTr,
    /// Tunable transmitter, fixed receiver
    TtFr,
}

impl Protocol {
    /// Side that has to tune under this protocol
    pub fn tunable_side(self) -> Side {
        match self {
            Protocol::FtTr => Side::Receiver,
            Protocol::TtFr => Side::Transmitter,
        }
    }

    /// `(transmitter, receiver)` roles of a node whose home is `home`
    ///
    /// Tunable endpoints start out parked on the home wavelength.
    pub fn roles(self, home: Wavelength) -> (Role, Role) {
        let fixed = Role::Fixed { wavelength: home };
        let tunable = Role::Tunable { tuned_to: home };
        match self {
            Protocol::FtTr => (fixed, tunable),
            Protocol::TtFr => (tunable, fixed),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::FtTr => write!(f, "FT_TR"),
            Protocol::TtFr => write!(f, "TT_FR"),
        }
    }
}

/// What happens to a request that finds its wavelength taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentionPolicy {
    /// Retry after a delay drawn from the backoff distribution
    #[default]
    Backoff,
    /// Drop the packet with reason `Contention`
    Drop,
}

/// Endpoint of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Transmitter,
    Receiver,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Transmitter => write!(f, "transmitter"),
            Side::Receiver => write!(f, "receiver"),
        }
    }
}

/// Fixed or tunable endpoint
///
/// # Example
/// ```
/// use ringsim_core::protocol::Role;
///
/// let fixed = Role::Fixed { wavelength: 2 };
/// assert!(!fixed.requires_tuning(0));
///
/// let mut tunable = Role::Tunable { tuned_to: 2 };
/// assert!(tunable.requires_tuning(0));
/// tunable.retune(0).unwrap();
/// assert_eq!(tunable.current(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// Permanently on one wavelength
    Fixed { wavelength: Wavelength },
    /// Currently tuned to `tuned_to`
    Tunable { tuned_to: Wavelength },
}

impl Role {
    pub fn current(&self) -> Wavelength {
        match *self {
            Role::Fixed { wavelength } => wavelength,
            Role::Tunable { tuned_to } => tuned_to,
        }
    }

    pub fn is_tunable(&self) -> bool {
        matches!(self, Role::Tunable { .. })
    }

    /// True if reaching `target` takes a tuning operation
    ///
    /// Fixed endpoints never tune.
    pub fn requires_tuning(&self, target: Wavelength) -> bool {
        match *self {
            Role::Fixed { .. } => false,
            Role::Tunable { tuned_to } => tuned_to != target,
        }
    }

    /// Move a tunable endpoint to `target`
    pub fn retune(&mut self, target: Wavelength) -> Result<(), RoleError> {
        match self {
            Role::Fixed { wavelength } => Err(RoleError::FixedRetune {
                wavelength: *wavelength,
                target,
            }),
            Role::Tunable { tuned_to } => {
                *tuned_to = target;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoleError {
    #[error("fixed endpoint on wavelength {wavelength} cannot retune to {target}")]
    FixedRetune {
        wavelength: Wavelength,
        target: Wavelength,
    },
}

/// Effect requested by a state machine, applied by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Push an event for `actor` at absolute `time`
    Schedule {
        time: SimTime,
        actor: NodeId,
        kind: EventKind,
    },
    /// Packet reached its destination; it is already marked delivered
    Deliver(Packet),
    /// Packet was discarded; it is already marked dropped
    Drop(Packet),
}

/// Fixed durations of the data path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Time a packet occupies its wavelength
    pub transmission_duration: SimTime,
    pub propagation_delay: SimTime,
}

/// Shared state of the ring a transmitter acts on
#[derive(Debug)]
pub struct Medium<'a> {
    /// Home wavelength of every node
    pub homes: &'a [Wavelength],
    pub channels: &'a mut WavelengthChannels,
    pub timing: Timing,
    pub policy: ContentionPolicy,
}

/// Counters kept by each endpoint
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EndpointStats {
    /// Tuning operations performed
    pub tunings: u64,
    /// Total time spent tuning
    pub tuning_time: SimTime,
    /// Requests that found their wavelength busy
    pub deferrals: u64,
    /// Packets sent (transmitter) or delivered (receiver)
    pub handled: u64,
}

impl EndpointStats {
    pub fn merge(&mut self, other: &EndpointStats) {
        self.tunings += other.tunings;
        self.tuning_time += other.tuning_time;
        self.deferrals += other.deferrals;
        self.handled += other.handled;
    }
}

/// Internal state-machine failure; aborts the run
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("{side} of node {node} got {event} while {phase}")]
    UnexpectedEvent {
        node: NodeId,
        side: Side,
        event: EventTag,
        phase: &'static str,
    },

    #[error("transmitter of node {node} is busy and cannot load packet {packet}")]
    TransmitterBusy { node: NodeId, packet: PacketId },

    #[error("packet {packet} for node {destination} was delivered to node {node}")]
    Misrouted {
        node: NodeId,
        packet: PacketId,
        destination: NodeId,
    },

    #[error("packet {packet} addresses unknown node {destination}")]
    UnknownDestination { packet: PacketId, destination: NodeId },

    #[error("node {node}: {source}")]
    Role {
        node: NodeId,
        #[source]
        source: RoleError,
    },

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_roles() {
        let (tx, rx) = Protocol::FtTr.roles(3);
        assert_eq!(tx, Role::Fixed { wavelength: 3 });
        assert!(rx.is_tunable());

        let (tx, rx) = Protocol::TtFr.roles(1);
        assert!(tx.is_tunable());
        assert_eq!(rx, Role::Fixed { wavelength: 1 });
        assert_eq!(Protocol::TtFr.tunable_side(), Side::Transmitter);
    }

    #[test]
    fn test_protocol_wire_names() {
        assert_eq!(serde_json::to_string(&Protocol::FtTr).unwrap(), "\"FT_TR\"");
        let parsed: Protocol = serde_json::from_str("\"TT_FR\"").unwrap();
        assert_eq!(parsed, Protocol::TtFr);
        assert_eq!(Protocol::TtFr.to_string(), "TT_FR");
    }

    #[test]
    fn test_fixed_role_refuses_retune() {
        let mut role = Role::Fixed { wavelength: 0 };
        assert!(role.retune(1).is_err());
        assert_eq!(role.current(), 0);
    }

    #[test]
    fn test_contention_policy_default() {
        assert_eq!(ContentionPolicy::default(), ContentionPolicy::Backoff);
        let parsed: ContentionPolicy = serde_json::from_str("\"drop\"").unwrap();
        assert_eq!(parsed, ContentionPolicy::Drop);
    }
}
