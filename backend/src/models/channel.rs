//! Wavelength occupancy
//!
//! A wavelength carries at most one transmission at a time. The table
//! records the current holder of each wavelength plus cumulative busy time
//! for utilisation figures. Busy time is credited when a transmission
//! ends; one still on the air is only counted up to the time asked for.
//!
//! # Example
//! ```
//! use ringsim_core::models::channel::WavelengthChannels;
//!
//! let mut channels = WavelengthChannels::new(1);
//! channels.occupy(0, 3, 1.0).unwrap();
//! assert_eq!(channels.busy_time_until(0, 1.5), 0.5);
//! channels.release(0, 3, 2.0).unwrap();
//! assert_eq!(channels.busy_time(0), 1.0);
//! ```

use crate::core::time::SimTime;
use crate::models::packet::{NodeId, Wavelength};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    #[error("wavelength {wavelength} does not exist")]
    UnknownWavelength { wavelength: Wavelength },

    #[error("wavelength {wavelength} is held by node {holder}")]
    Busy { wavelength: Wavelength, holder: NodeId },

    #[error("node {node} released wavelength {wavelength} it does not hold")]
    NotHolder { wavelength: Wavelength, node: NodeId },
}

#[derive(Debug, Clone, Default)]
struct Slot {
    holder: Option<NodeId>,
    /// Start of the transmission in progress
    since: SimTime,
    /// Busy time of finished transmissions
    busy_time: SimTime,
    transmissions: u64,
}

/// Holder and usage record of every wavelength on the ring
#[derive(Debug, Clone)]
pub struct WavelengthChannels {
    slots: Vec<Slot>,
}

impl WavelengthChannels {
    pub fn new(wavelength_count: usize) -> Self {
        Self {
            slots: vec![Slot::default(); wavelength_count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_free(&self, wavelength: Wavelength) -> bool {
        self.slots
            .get(wavelength)
            .map_or(false, |slot| slot.holder.is_none())
    }

    pub fn holder(&self, wavelength: Wavelength) -> Option<NodeId> {
        self.slots.get(wavelength).and_then(|slot| slot.holder)
    }

    /// Claim `wavelength` for `node` from `now`
    pub fn occupy(
        &mut self,
        wavelength: Wavelength,
        node: NodeId,
        now: SimTime,
    ) -> Result<(), ChannelError> {
        let slot = self
            .slots
            .get_mut(wavelength)
            .ok_or(ChannelError::UnknownWavelength { wavelength })?;
        if let Some(holder) = slot.holder {
            return Err(ChannelError::Busy { wavelength, holder });
        }
        slot.holder = Some(node);
        slot.since = now;
        slot.transmissions += 1;
        Ok(())
    }

    /// Release `wavelength` at `now`; `node` must currently hold it
    pub fn release(
        &mut self,
        wavelength: Wavelength,
        node: NodeId,
        now: SimTime,
    ) -> Result<(), ChannelError> {
        let slot = self
            .slots
            .get_mut(wavelength)
            .ok_or(ChannelError::UnknownWavelength { wavelength })?;
        if slot.holder != Some(node) {
            return Err(ChannelError::NotHolder { wavelength, node });
        }
        slot.holder = None;
        slot.busy_time += (now - slot.since).max(0.0);
        Ok(())
    }

    /// Cumulative time `wavelength` carried a finished transmission
    pub fn busy_time(&self, wavelength: Wavelength) -> SimTime {
        self.slots.get(wavelength).map_or(0.0, |slot| slot.busy_time)
    }

    /// Busy time up to `t`, counting a transmission still on the air
    /// only from its start until `t`
    pub fn busy_time_until(&self, wavelength: Wavelength, t: SimTime) -> SimTime {
        self.slots.get(wavelength).map_or(0.0, |slot| match slot.holder {
            Some(_) => slot.busy_time + (t - slot.since).max(0.0),
            None => slot.busy_time,
        })
    }

    pub fn transmissions(&self, wavelength: Wavelength) -> u64 {
        self.slots.get(wavelength).map_or(0, |slot| slot.transmissions)
    }
}
