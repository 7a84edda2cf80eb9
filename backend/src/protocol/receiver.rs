//! Receiver state machine
//!
//! Phases: `idle -> (tuning) -> idle`. Reception itself takes no simulated
//! time: the transmitter already spent the transmission duration on the
//! wavelength, so a packet is delivered the moment it arrives at a receiver
//! that listens on the right wavelength.
//!
//! A fixed receiver listens only to its home wavelength and drops anything
//! else as a protocol mismatch. A tunable receiver retunes to the sender's
//! wavelength first; a packet arriving while it is mid-tune is contention.

use super::{Action, ContentionPolicy, EndpointStats, ProtocolError, Role, Side};
use crate::core::time::SimTime;
use crate::models::event::{EventKind, EventTag};
use crate::models::packet::{DropReason, NodeId, Packet, Wavelength};
use crate::rng::Sampler;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Tuning { target: Wavelength },
}

/// Receiving endpoint of one node
#[derive(Debug, Clone)]
pub struct Receiver {
    node: NodeId,
    role: Role,
    phase: Phase,
    /// Packet waiting for the current tuning to finish
    held: Option<Packet>,
    stats: EndpointStats,
}

impl Receiver {
    pub fn new(node: NodeId, role: Role) -> Self {
        Self {
            node,
            role,
            phase: Phase::Idle,
            held: None,
            stats: EndpointStats::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn stats(&self) -> &EndpointStats {
        &self.stats
    }

    pub fn is_tuning(&self) -> bool {
        matches!(self.phase, Phase::Tuning { .. })
    }

    /// Handle a packet arriving on `wavelength`
    pub fn on_receive(
        &mut self,
        now: SimTime,
        packet: Packet,
        wavelength: Wavelength,
        policy: ContentionPolicy,
        backoff: &mut Sampler,
    ) -> Result<Vec<Action>, ProtocolError> {
        if packet.destination() != self.node {
            return Err(ProtocolError::Misrouted {
                node: self.node,
                packet: packet.id(),
                destination: packet.destination(),
            });
        }

        match self.role {
            Role::Fixed { wavelength: home } if wavelength != home => {
                Ok(vec![discard(packet, DropReason::ProtocolMismatch, now)?])
            }
            Role::Fixed { .. } => Ok(vec![self.deliver(packet, now)?]),
            Role::Tunable { .. } if self.is_tuning() => {
                self.stats.deferrals += 1;
                debug!(node = self.node, wavelength, ?policy, "Receiver busy tuning");
                match policy {
                    ContentionPolicy::Backoff => Ok(vec![Action::Schedule {
                        time: now + backoff.sample(),
                        actor: self.node,
                        kind: EventKind::Receive { packet, wavelength },
                    }]),
                    ContentionPolicy::Drop => {
                        Ok(vec![discard(packet, DropReason::Contention, now)?])
                    }
                }
            }
            Role::Tunable { tuned_to } if tuned_to == wavelength => {
                Ok(vec![self.deliver(packet, now)?])
            }
            Role::Tunable { .. } => {
                self.held = Some(packet);
                self.phase = Phase::Tuning { target: wavelength };
                Ok(vec![Action::Schedule {
                    time: now,
                    actor: self.node,
                    kind: EventKind::TuneStart {
                        side: Side::Receiver,
                    },
                }])
            }
        }
    }

    pub fn on_tune_start(
        &mut self,
        now: SimTime,
        tuning: &mut Sampler,
    ) -> Result<Vec<Action>, ProtocolError> {
        if !self.is_tuning() {
            return Err(self.unexpected(EventTag::TuneStart));
        }
        let duration = tuning.sample();
        self.stats.tunings += 1;
        self.stats.tuning_time += duration;
        Ok(vec![Action::Schedule {
            time: now + duration,
            actor: self.node,
            kind: EventKind::TuneEnd {
                side: Side::Receiver,
            },
        }])
    }

    /// Finish retuning and deliver the held packet
    pub fn on_tune_end(&mut self, now: SimTime) -> Result<Vec<Action>, ProtocolError> {
        let Phase::Tuning { target } = self.phase else {
            return Err(self.unexpected(EventTag::TuneEnd));
        };
        self.role
            .retune(target)
            .map_err(|source| ProtocolError::Role {
                node: self.node,
                source,
            })?;
        let packet = self
            .held
            .take()
            .ok_or_else(|| self.unexpected(EventTag::TuneEnd))?;
        self.phase = Phase::Idle;
        Ok(vec![self.deliver(packet, now)?])
    }

    /// Remove a packet held across a tuning operation
    pub fn take_held(&mut self) -> Option<Packet> {
        self.phase = Phase::Idle;
        self.held.take()
    }

    fn deliver(&mut self, mut packet: Packet, now: SimTime) -> Result<Action, ProtocolError> {
        packet.deliver(now)?;
        self.stats.handled += 1;
        Ok(Action::Deliver(packet))
    }

    fn unexpected(&self, event: EventTag) -> ProtocolError {
        ProtocolError::UnexpectedEvent {
            node: self.node,
            side: Side::Receiver,
            event,
            phase: match self.phase {
                Phase::Idle => "idle",
                Phase::Tuning { .. } => "tuning",
            },
        }
    }
}

fn discard(mut packet: Packet, reason: DropReason, now: SimTime) -> Result<Action, ProtocolError> {
    packet.drop_with(reason, now)?;
    Ok(Action::Drop(packet))
}
