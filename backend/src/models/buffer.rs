//! Bounded per-node transmit buffer
//!
//! FIFO of packets waiting for the node's transmitter. A full buffer never
//! blocks: the incoming packet is marked dropped and handed back so the
//! caller can account for it.
//!
//! CRITICAL: `0 <= len <= capacity` holds after every operation.

use crate::core::time::SimTime;
use crate::models::packet::{DropReason, Packet, PacketError};
use std::collections::VecDeque;

/// Outcome of offering a packet to a buffer
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueue {
    /// Packet was appended to the queue
    Queued,
    /// Buffer was full; the packet is returned marked `BufferOverflow`
    Dropped(Packet),
}

impl Enqueue {
    pub fn is_queued(&self) -> bool {
        matches!(self, Enqueue::Queued)
    }
}

/// Bounded FIFO with occupancy records
///
/// # Example
/// ```
/// use ringsim_core::models::buffer::{Buffer, Enqueue};
/// use ringsim_core::Packet;
///
/// let mut buffer = Buffer::new(1);
/// assert!(buffer.enqueue(Packet::new(0, 0, 1, 0.0), 0.0).unwrap().is_queued());
///
/// match buffer.enqueue(Packet::new(1, 0, 1, 0.5), 0.5).unwrap() {
///     Enqueue::Dropped(packet) => assert!(packet.is_terminal()),
///     Enqueue::Queued => unreachable!(),
/// }
/// assert_eq!(buffer.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Buffer {
    queue: VecDeque<Packet>,
    capacity: usize,
    peak: usize,
    enqueued: u64,
    dequeued: u64,
    overflowed: u64,
}

impl Buffer {
    /// Empty buffer holding at most `capacity` packets
    ///
    /// Storage grows with occupancy, so an effectively unbounded capacity
    /// costs nothing up front.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
            peak: 0,
            enqueued: 0,
            dequeued: 0,
            overflowed: 0,
        }
    }

    /// Append `packet`, or drop it if the buffer is full
    ///
    /// Only pending packets may be offered.
    pub fn enqueue(&mut self, mut packet: Packet, now: SimTime) -> Result<Enqueue, PacketError> {
        if packet.is_terminal() {
            return Err(PacketError::AlreadyTerminal { id: packet.id() });
        }

        if self.is_full() {
            packet.drop_with(DropReason::BufferOverflow, now)?;
            self.overflowed += 1;
            return Ok(Enqueue::Dropped(packet));
        }

        self.queue.push_back(packet);
        self.enqueued += 1;
        self.peak = self.peak.max(self.queue.len());
        Ok(Enqueue::Queued)
    }

    /// Remove the oldest packet
    pub fn dequeue(&mut self) -> Option<Packet> {
        let packet = self.queue.pop_front()?;
        self.dequeued += 1;
        Some(packet)
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.queue.front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest occupancy ever observed
    pub fn peak_len(&self) -> usize {
        self.peak
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued
    }

    /// Packets refused because the buffer was full
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// Remove every queued packet, oldest first
    pub fn drain(&mut self) -> Vec<Packet> {
        self.queue.drain(..).collect()
    }
}
