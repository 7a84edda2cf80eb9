//! Closed-form delay estimate for a ring configuration
//!
//! Queueing model of a slotted WDM ring: each node is an M/M/1-like queue
//! whose service time is the slot length plus the expected wait for a free
//! slot and the expected tuning time. The estimate is only meaningful for
//! exponential-like traffic and is reported next to the measured delays
//! for comparison.

use crate::core::time::SimTime;
use crate::orchestrator::config::NetworkConfig;
use serde::{Deserialize, Serialize};

/// Predicted mean delays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayEstimate {
    /// Time from arrival until the packet goes on the air
    pub queueing_delay: SimTime,
    /// Time from arrival until delivery
    pub transfer_delay: SimTime,
}

/// Estimate mean delays for `config`
///
/// Returns `None` when the offered load saturates the ring or a law has no
/// finite mean.
///
/// # Example
/// ```
/// use ringsim_core::{NetworkConfig, Protocol, Distribution};
/// use ringsim_core::metrics::analysis::estimate;
///
/// let mut config = NetworkConfig::new(4, 4, Protocol::FtTr);
/// config.arrival_distribution = Distribution::Exponential { rate: 0.1 };
/// let light = estimate(&config).unwrap();
/// assert!(light.transfer_delay > light.queueing_delay);
///
/// config.arrival_distribution = Distribution::Exponential { rate: 1000.0 };
/// assert!(estimate(&config).is_none());
/// ```
pub fn estimate(config: &NetworkConfig) -> Option<DelayEstimate> {
    let lambda = config.arrival_rate()?;
    let t_tune = config.tuning_distribution.mean()?;
    let t_slot = config.transmission_duration;
    let n = config.node_count as f64;
    let w = config.wavelength_count as f64;

    let slot_contention = 2.0 * w - t_slot * n * lambda;
    if slot_contention <= 0.0 {
        return None;
    }
    let access_delay = t_slot / 2.0
        + t_tune * (n - 1.0) / n
        + (t_slot * t_slot * n * lambda) / slot_contention;

    let mu = 1.0 / (access_delay + t_slot);
    if mu <= lambda {
        return None;
    }
    let rho = lambda / mu;
    let buffer_delay = rho / (mu - lambda);

    let queueing_delay = access_delay + buffer_delay;
    Some(DelayEstimate {
        queueing_delay,
        transfer_delay: queueing_delay + t_slot + config.propagation_delay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;
    use crate::rng::Distribution;

    #[test]
    fn test_delay_grows_with_load() {
        let mut config = NetworkConfig::new(8, 4, Protocol::TtFr);
        config.arrival_distribution = Distribution::Exponential { rate: 0.1 };
        let light = estimate(&config).unwrap();
        config.arrival_distribution = Distribution::Exponential { rate: 0.5 };
        let heavy = estimate(&config).unwrap();
        assert!(heavy.queueing_delay > light.queueing_delay);
    }

    #[test]
    fn test_infinite_mean_has_no_estimate() {
        let mut config = NetworkConfig::new(4, 4, Protocol::FtTr);
        config.tuning_distribution = Distribution::Pareto {
            shape: 1.0,
            scale: 1.0,
        };
        assert!(estimate(&config).is_none());
    }

    #[test]
    fn test_propagation_adds_to_transfer_only() {
        let mut config = NetworkConfig::new(4, 4, Protocol::FtTr);
        config.arrival_distribution = Distribution::Exponential { rate: 0.2 };
        let base = estimate(&config).unwrap();
        config.propagation_delay = 2.0;
        let far = estimate(&config).unwrap();
        assert_eq!(base.queueing_delay, far.queueing_delay);
        assert!((far.transfer_delay - base.transfer_delay - 2.0).abs() < 1e-12);
    }
}
