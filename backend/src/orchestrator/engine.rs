//! Simulation engine
//!
//! One [`Simulator`] owns every piece of state of one run: nodes, wavelength
//! table, clocks, event queue and statistics. Nothing is global, so any
//! number of simulators can run side by side on different threads.
//!
//! # Event loop
//!
//! ```text
//! loop:
//!   1. Stop if the delivered target is met
//!   2. Pop the earliest event (stop if none is due before the horizon)
//!   3. Advance the merged timeline and the event's domain clock
//!   4. Dispatch to the actor's transmitter, receiver or traffic source
//!   5. Apply the returned actions (schedule, deliver, drop)
//!   6. Hand the next buffered packet to the actor's transmitter if it is idle
//! ```
//!
//! When the loop stops, every packet still in the system is dropped as
//! `Truncated`, so `generated == delivered + dropped` holds for every run.
//!
//! # Example
//!
//! ```rust
//! use ringsim_core::{NetworkConfig, Protocol, Simulator};
//!
//! let mut config = NetworkConfig::new(4, 4, Protocol::FtTr);
//! config.horizon = Some(50.0);
//! config.seed = 3;
//!
//! let mut sim = Simulator::new(config).unwrap();
//! while sim.step().unwrap().is_some() {}
//! let summary = sim.finish().unwrap();
//!
//! assert!(summary.is_conserved());
//! ```

use crate::arrivals::ArrivalGenerator;
use crate::core::event_queue::EventQueue;
use crate::core::time::{CausalityViolation, Clock, ClockDomain, SimTime};
use crate::metrics::analysis;
use crate::metrics::{EventCounts, MetricsCollector, RunFacts, Summary};
use crate::models::channel::WavelengthChannels;
use crate::models::buffer::Enqueue;
use crate::models::event::{Event, EventKind, EventLog, EventRecord};
use crate::models::node::{Node, NodeSpec};
use crate::models::packet::{DropReason, NodeId, Packet, PacketError, Wavelength};
use crate::orchestrator::config::{ConfigError, NetworkConfig};
use crate::protocol::{Action, Medium, ProtocolError, Side, Timing};
use crate::rng::DistributionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The next event lay beyond the horizon
    Horizon,
    /// The delivered-packet target was reached
    TargetDelivered,
    /// No event was left to dispatch
    Exhausted,
    /// Finished by the caller before any stop condition held
    Halted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Horizon => write!(f, "horizon"),
            StopReason::TargetDelivered => write!(f, "target delivered"),
            StopReason::Exhausted => write!(f, "exhausted"),
            StopReason::Halted => write!(f, "halted"),
        }
    }
}

/// Failure of a single run
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid distribution: {0}")]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Causality(#[from] CausalityViolation),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("event addressed to unknown node {0}")]
    UnknownNode(NodeId),
}

impl SimulationError {
    /// True for errors caused by the configuration rather than the engine
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimulationError::Config(_) | SimulationError::Distribution(_)
        )
    }

    pub fn is_causality(&self) -> bool {
        matches!(self, SimulationError::Causality(_))
    }
}

/// Complete state of one run
pub struct Simulator {
    config: NetworkConfig,
    homes: Vec<Wavelength>,
    nodes: Vec<Node>,
    arrivals: ArrivalGenerator,
    channels: WavelengthChannels,

    /// Merged timeline of every dispatched event
    timeline: Clock,
    data_clock: Clock,
    control_clock: Clock,

    queue: EventQueue,
    metrics: MetricsCollector,
    events: EventCounts,
    event_log: EventLog,
    stop_reason: Option<StopReason>,
}

impl Simulator {
    /// Validate `config`, build every node and seed one arrival per node
    pub fn new(config: NetworkConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let homes = config.home_table();
        let spec = NodeSpec {
            protocol: config.protocol,
            buffer_capacity: config.buffer_capacity,
            tuning: &config.tuning_distribution,
            backoff: &config.backoff_distribution,
            seed: config.seed,
        };
        let nodes = homes
            .iter()
            .enumerate()
            .map(|(id, &home)| Node::new(id, home, spec))
            .collect::<Result<Vec<_>, _>>()?;

        let mut arrivals = ArrivalGenerator::new(
            config.node_count,
            &config.arrival_distribution,
            config.destination_weights.clone(),
            config.seed,
        )?;

        let mut queue = EventQueue::new();
        for node in 0..config.node_count {
            let gap = arrivals
                .next_interarrival(node)
                .ok_or(SimulationError::UnknownNode(node))?;
            queue.push(gap, node, EventKind::Arrival);
        }

        let data_clock = match config.data_cycle {
            Some(cycle) => Clock::with_cycle(ClockDomain::Data, cycle),
            None => Clock::new(ClockDomain::Data),
        };
        let control_clock = match config.control_cycle {
            Some(cycle) => Clock::with_cycle(ClockDomain::Control, cycle),
            None => Clock::new(ClockDomain::Control),
        };

        info!(
            protocol = %config.protocol,
            nodes = config.node_count,
            wavelengths = config.wavelength_count,
            seed = config.seed,
            "Starting simulation"
        );

        Ok(Self {
            channels: WavelengthChannels::new(config.wavelength_count),
            metrics: MetricsCollector::new(config.node_count),
            homes,
            nodes,
            arrivals,
            timeline: Clock::new(ClockDomain::Timeline),
            data_clock,
            control_clock,
            queue,
            events: EventCounts::default(),
            event_log: EventLog::new(),
            stop_reason: None,
            config,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Time of the last dispatched event
    pub fn now(&self) -> SimTime {
        self.timeline.now()
    }

    /// Clock of one domain
    pub fn clock(&self, domain: ClockDomain) -> &Clock {
        match domain {
            ClockDomain::Timeline => &self.timeline,
            ClockDomain::Data => &self.data_clock,
            ClockDomain::Control => &self.control_clock,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn channels(&self) -> &WavelengthChannels {
        &self.channels
    }

    /// Earliest pending event
    pub fn next_event(&self) -> Option<&Event> {
        self.queue.peek()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Dispatched events, if `record_events` is set
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_reason.is_some()
    }

    /// Dispatch the next event
    ///
    /// Returns the dispatched event, or `None` once the run has stopped.
    pub fn step(&mut self) -> Result<Option<EventRecord>, SimulationError> {
        if self.stop_reason.is_some() {
            return Ok(None);
        }
        if let Some(target) = self.config.target_delivered {
            if self.metrics.delivered() >= target {
                self.stop(StopReason::TargetDelivered);
                return Ok(None);
            }
        }

        let Some(event) = self.queue.pop_due(self.config.horizon) else {
            let reason = if self.queue.is_empty() {
                StopReason::Exhausted
            } else {
                StopReason::Horizon
            };
            self.stop(reason);
            return Ok(None);
        };

        let record = event.record();
        let (time, actor, kind) = event.into_parts();
        self.timeline.advance_to(time)?;
        match kind.domain() {
            ClockDomain::Data => self.data_clock.advance_to(time)?,
            ClockDomain::Control => self.control_clock.advance_to(time)?,
            ClockDomain::Timeline => {}
        }

        self.events.record(record.tag);
        if self.config.record_events {
            self.event_log.log(record);
        }
        trace!(time, actor, event = %record.tag, "Dispatching event");

        let actions = self.dispatch(time, actor, kind)?;
        self.apply(actions)?;
        self.feed_transmitter(actor, time)?;

        Ok(Some(record))
    }

    /// Step until a stop condition holds
    pub fn run(&mut self) -> Result<StopReason, SimulationError> {
        loop {
            if self.step()?.is_none() {
                return Ok(self.stop_reason.unwrap_or(StopReason::Exhausted));
            }
        }
    }

    /// Drop every packet still in the system and reduce the statistics
    ///
    /// May be called at any point; a run finished before any stop condition
    /// held reports [`StopReason::Halted`].
    pub fn finish(mut self) -> Result<Summary, SimulationError> {
        let stop_reason = self.stop_reason.unwrap_or(StopReason::Halted);
        let duration = match (stop_reason, self.config.horizon) {
            (StopReason::Horizon, Some(horizon)) => horizon,
            _ => self.timeline.now(),
        };

        let mut leftovers: Vec<Packet> = Vec::new();
        for event in self.queue.drain() {
            if let (_, _, EventKind::Receive { packet, .. }) = event.into_parts() {
                leftovers.push(packet);
            }
        }
        for node in &mut self.nodes {
            leftovers.extend(node.receiver.take_held());
            leftovers.extend(node.transmitter.take_packet());
            leftovers.extend(node.buffer.drain());
        }
        let truncated = leftovers.len();
        for mut packet in leftovers {
            packet.drop_with(DropReason::Truncated, duration)?;
            self.metrics.record_terminal(&packet)?;
        }
        debug!(truncated, reason = %stop_reason, "Truncated packets left in the system");

        let summary = self.metrics.summarize(RunFacts {
            protocol: self.config.protocol,
            seed: self.config.seed,
            stop_reason,
            simulated_duration: duration,
            nodes: &self.nodes,
            channels: &self.channels,
            events: self.events,
            estimate: analysis::estimate(&self.config),
        });

        info!(
            generated = summary.generated,
            delivered = summary.delivered,
            dropped = summary.dropped,
            throughput = summary.throughput,
            "Simulation finished"
        );
        Ok(summary)
    }

    fn stop(&mut self, reason: StopReason) {
        debug!(time = self.timeline.now(), %reason, "Stopping run");
        self.stop_reason = Some(reason);
    }

    fn dispatch(
        &mut self,
        now: SimTime,
        actor: NodeId,
        kind: EventKind,
    ) -> Result<Vec<Action>, SimulationError> {
        if matches!(kind, EventKind::Arrival) {
            return self.on_arrival(actor, now);
        }

        let policy = self.config.contention_policy;
        let timing = Timing {
            transmission_duration: self.config.transmission_duration,
            propagation_delay: self.config.propagation_delay,
        };
        let node = self
            .nodes
            .get_mut(actor)
            .ok_or(SimulationError::UnknownNode(actor))?;
        let mut medium = Medium {
            homes: &self.homes,
            channels: &mut self.channels,
            timing,
            policy,
        };

        let actions = match kind {
            EventKind::TransmitStart => {
                node.transmitter
                    .on_transmit_start(now, &mut medium, &mut node.backoff)?
            }
            EventKind::TransmitEnd => node.transmitter.on_transmit_end(now, &mut medium)?,
            EventKind::TuneStart {
                side: Side::Transmitter,
            } => node.transmitter.on_tune_start(now, &mut node.tuning)?,
            EventKind::TuneStart {
                side: Side::Receiver,
            } => node.receiver.on_tune_start(now, &mut node.tuning)?,
            EventKind::TuneEnd {
                side: Side::Transmitter,
            } => node.transmitter.on_tune_end(now)?,
            EventKind::TuneEnd {
                side: Side::Receiver,
            } => node.receiver.on_tune_end(now)?,
            EventKind::Receive { packet, wavelength } => {
                node.receiver
                    .on_receive(now, packet, wavelength, policy, &mut node.backoff)?
            }
            // handled above
            EventKind::Arrival => Vec::new(),
        };
        Ok(actions)
    }

    fn on_arrival(&mut self, node_id: NodeId, now: SimTime) -> Result<Vec<Action>, SimulationError> {
        let packet = self
            .arrivals
            .generate(node_id, now)
            .ok_or(SimulationError::UnknownNode(node_id))?;
        let gap = self
            .arrivals
            .next_interarrival(node_id)
            .ok_or(SimulationError::UnknownNode(node_id))?;
        self.metrics.record_generated(&packet);

        let mut actions = vec![Action::Schedule {
            time: now + gap,
            actor: node_id,
            kind: EventKind::Arrival,
        }];

        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or(SimulationError::UnknownNode(node_id))?;
        if node.transmitter.is_idle() && node.buffer.is_empty() {
            actions.extend(node.transmitter.load(packet, now)?);
        } else if let Enqueue::Dropped(packet) = node.buffer.enqueue(packet, now)? {
            actions.push(Action::Drop(packet));
        }
        Ok(actions)
    }

    fn apply(&mut self, actions: Vec<Action>) -> Result<(), SimulationError> {
        for action in actions {
            match action {
                Action::Schedule { time, actor, kind } => self.schedule(time, actor, kind)?,
                Action::Deliver(packet) => {
                    trace!(packet_id = packet.id(), "Packet delivered");
                    self.metrics.record_terminal(&packet)?;
                }
                Action::Drop(packet) => {
                    if let Some(reason) = packet.drop_reason() {
                        debug!(
                            packet_id = packet.id(),
                            source = packet.source(),
                            destination = packet.destination(),
                            %reason,
                            "Packet dropped"
                        );
                    }
                    self.metrics.record_terminal(&packet)?;
                }
            }
        }
        Ok(())
    }

    /// Queue an event, aligning slotted operations to their clock's cycle
    fn schedule(&mut self, time: SimTime, actor: NodeId, kind: EventKind) -> Result<(), SimulationError> {
        let time = match kind {
            EventKind::TransmitStart => self.data_clock.next_boundary(time),
            EventKind::TuneStart { .. } => self.control_clock.next_boundary(time),
            _ => time,
        };
        self.timeline.check_not_before(time)?;
        self.queue.push(time, actor, kind);
        Ok(())
    }

    /// Give an idle transmitter the oldest buffered packet
    fn feed_transmitter(&mut self, node_id: NodeId, now: SimTime) -> Result<(), SimulationError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or(SimulationError::UnknownNode(node_id))?;
        if !node.transmitter.is_idle() {
            return Ok(());
        }
        let Some(packet) = node.buffer.dequeue() else {
            return Ok(());
        };
        let actions = node.transmitter.load(packet, now)?;
        self.apply(actions)
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("protocol", &self.config.protocol)
            .field("seed", &self.config.seed)
            .field("now", &self.timeline.now())
            .field("pending_events", &self.queue.len())
            .field("stop_reason", &self.stop_reason)
            .finish()
    }
}

/// Run `config` to completion and return its summary
pub fn run(config: &NetworkConfig) -> Result<Summary, SimulationError> {
    let mut simulator = Simulator::new(config.clone())?;
    simulator.run()?;
    simulator.finish()
}
