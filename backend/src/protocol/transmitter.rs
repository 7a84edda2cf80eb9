//! Transmitter state machine
//!
//! Phases: `idle -> pending -> (tuning) -> transmitting -> idle`.
//!
//! A fixed transmitter always sends on its home wavelength. A tunable one
//! sends on the destination's home wavelength and first retunes if it is
//! parked elsewhere. A start attempt that finds its wavelength held by
//! another node is a contention: it is retried after a backoff or the
//! packet is dropped, depending on the contention policy.

use super::{Action, ContentionPolicy, EndpointStats, Medium, ProtocolError, Role, Side};
use crate::core::time::SimTime;
use crate::models::event::{EventKind, EventTag};
use crate::models::packet::{DropReason, NodeId, Packet, Wavelength};
use crate::rng::Sampler;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// Packet loaded, waiting for its start attempt
    Pending,
    Tuning { target: Wavelength },
    Transmitting { wavelength: Wavelength },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Pending => "pending",
            Phase::Tuning { .. } => "tuning",
            Phase::Transmitting { .. } => "transmitting",
        }
    }
}

/// Sending endpoint of one node
#[derive(Debug, Clone)]
pub struct Transmitter {
    node: NodeId,
    role: Role,
    phase: Phase,
    packet: Option<Packet>,
    stats: EndpointStats,
}

impl Transmitter {
    pub fn new(node: NodeId, role: Role) -> Self {
        Self {
            node,
            role,
            phase: Phase::Idle,
            packet: None,
            stats: EndpointStats::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn stats(&self) -> &EndpointStats {
        &self.stats
    }

    /// True when no packet is in service
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn is_tuning(&self) -> bool {
        matches!(self.phase, Phase::Tuning { .. })
    }

    /// Packet currently in service
    pub fn packet(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    /// Take a packet into service and request a start attempt at `now`
    pub fn load(&mut self, packet: Packet, now: SimTime) -> Result<Vec<Action>, ProtocolError> {
        if self.phase != Phase::Idle {
            return Err(ProtocolError::TransmitterBusy {
                node: self.node,
                packet: packet.id(),
            });
        }
        self.packet = Some(packet);
        self.phase = Phase::Pending;
        Ok(vec![self.schedule(now, EventKind::TransmitStart)])
    }

    /// Try to put the loaded packet on the air
    pub fn on_transmit_start(
        &mut self,
        now: SimTime,
        medium: &mut Medium<'_>,
        backoff: &mut Sampler,
    ) -> Result<Vec<Action>, ProtocolError> {
        if self.phase != Phase::Pending {
            return Err(self.unexpected(EventTag::TransmitStart));
        }
        let target = self.target(medium.homes)?;

        if self.role.requires_tuning(target) {
            self.phase = Phase::Tuning { target };
            return Ok(vec![self.schedule(
                now,
                EventKind::TuneStart {
                    side: Side::Transmitter,
                },
            )]);
        }

        if !medium.channels.is_free(target) {
            self.stats.deferrals += 1;
            debug!(
                node = self.node,
                wavelength = target,
                holder = ?medium.channels.holder(target),
                policy = ?medium.policy,
                "Wavelength busy"
            );
            return match medium.policy {
                ContentionPolicy::Backoff => {
                    let retry = now + backoff.sample();
                    Ok(vec![self.schedule(retry, EventKind::TransmitStart)])
                }
                ContentionPolicy::Drop => {
                    let packet = self.release_packet(EventTag::TransmitStart)?;
                    Ok(vec![discard(packet, DropReason::Contention, now)?])
                }
            };
        }

        let until = now + medium.timing.transmission_duration;
        medium.channels.occupy(target, self.node, now)?;
        if let Some(packet) = self.packet.as_mut() {
            packet.begin_service(now, target);
        }
        self.phase = Phase::Transmitting { wavelength: target };
        Ok(vec![self.schedule(until, EventKind::TransmitEnd)])
    }

    /// Begin retuning; the duration comes from `tuning`
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
        Ok(vec![self.schedule(
            now + duration,
            EventKind::TuneEnd {
                side: Side::Transmitter,
            },
        )])
    }

    /// Finish retuning and retry the start immediately
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
        self.phase = Phase::Pending;
        Ok(vec![self.schedule(now, EventKind::TransmitStart)])
    }

    /// Free the wavelength and launch the packet towards its destination
    pub fn on_transmit_end(
        &mut self,
        now: SimTime,
        medium: &mut Medium<'_>,
    ) -> Result<Vec<Action>, ProtocolError> {
        let Phase::Transmitting { wavelength } = self.phase else {
            return Err(self.unexpected(EventTag::TransmitEnd));
        };
        medium.channels.release(wavelength, self.node, now)?;
        let packet = self.release_packet(EventTag::TransmitEnd)?;
        self.stats.handled += 1;

        Ok(vec![Action::Schedule {
            time: now + medium.timing.propagation_delay,
            actor: packet.destination(),
            kind: EventKind::Receive { packet, wavelength },
        }])
    }

    /// Remove the packet in service, if any, leaving the transmitter idle
    pub fn take_packet(&mut self) -> Option<Packet> {
        self.phase = Phase::Idle;
        self.packet.take()
    }

    fn target(&self, homes: &[Wavelength]) -> Result<Wavelength, ProtocolError> {
        let packet = self
            .packet
            .as_ref()
            .ok_or_else(|| self.unexpected(EventTag::TransmitStart))?;
        match self.role {
            Role::Fixed { wavelength } => Ok(wavelength),
            Role::Tunable { .. } => homes.get(packet.destination()).copied().ok_or(
                ProtocolError::UnknownDestination {
                    packet: packet.id(),
                    destination: packet.destination(),
                },
            ),
        }
    }

    fn release_packet(&mut self, event: EventTag) -> Result<Packet, ProtocolError> {
        let packet = self.packet.take().ok_or_else(|| self.unexpected(event))?;
        self.phase = Phase::Idle;
        Ok(packet)
    }

    fn schedule(&self, time: SimTime, kind: EventKind) -> Action {
        Action::Schedule {
            time,
            actor: self.node,
            kind,
        }
    }

    fn unexpected(&self, event: EventTag) -> ProtocolError {
        ProtocolError::UnexpectedEvent {
            node: self.node,
            side: Side::Transmitter,
            event,
            phase: self.phase.name(),
        }
    }
}

fn discard(mut packet: Packet, reason: DropReason, now: SimTime) -> Result<Action, ProtocolError> {
    packet.drop_with(reason, now)?;
    Ok(Action::Drop(packet))
}
