//! Run configuration
//!
//! A [`NetworkConfig`] fully determines a run: topology, protocol, traffic
//! laws, stop condition and seed. It is plain serde data, usually read from
//! JSON, and must pass [`NetworkConfig::validate`] before the engine
//! touches it.

use crate::core::digest;
use crate::core::time::SimTime;
use crate::models::packet::{NodeId, Wavelength};
use crate::protocol::{ContentionPolicy, Protocol};
use crate::rng::{Distribution, DistributionError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Invalid run configuration; reported before any simulated time passes
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("node_count must be at least 2, got {0}")]
    TooFewNodes(usize),

    #[error("wavelength_count must be at least 1")]
    NoWavelengths,

    #[error("invalid {field}: {source}")]
    InvalidDistribution {
        field: &'static str,
        #[source]
        source: DistributionError,
    },

    #[error("backoff_distribution always yields zero; contention retries would never advance time")]
    ZeroBackoff,

    #[error("{field} must be {requirement}, got {value}")]
    InvalidDuration {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },

    #[error("home_wavelengths has {actual} entries for {expected} nodes")]
    HomeTableLength { expected: usize, actual: usize },

    #[error("node {node} has home wavelength {wavelength} but only {wavelength_count} exist")]
    HomeOutOfRange {
        node: NodeId,
        wavelength: Wavelength,
        wavelength_count: usize,
    },

    #[error("destination_weights has {actual} entries for {expected} nodes")]
    WeightsLength { expected: usize, actual: usize },

    #[error("destination weight of node {node} must be finite and non-negative, got {weight}")]
    InvalidWeight { node: NodeId, weight: f64 },

    #[error("node {node} has no other node with positive destination weight")]
    NoReachableDestination { node: NodeId },

    #[error("either horizon or target_delivered must be set")]
    NoStopCondition,

    #[error("target_delivered must be positive")]
    ZeroTarget,

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

fn default_buffer_capacity() -> usize {
    1
}

fn default_arrival() -> Distribution {
    Distribution::Exponential { rate: 1.0 }
}

fn default_tuning() -> Distribution {
    Distribution::Constant { value: 0.05 }
}

fn default_backoff() -> Distribution {
    Distribution::Exponential { rate: 10.0 }
}

fn default_transmission_duration() -> SimTime {
    0.1
}

/// Complete description of one simulation run
///
/// # Example
/// ```
/// use ringsim_core::{NetworkConfig, Protocol};
///
/// let config = NetworkConfig::from_json_str(
///     r#"{
///         "node_count": 4,
///         "wavelength_count": 2,
///         "protocol": "TT_FR",
///         "arrival_distribution": {"kind": "exponential", "rate": 0.5},
///         "horizon": 100.0,
///         "seed": 7
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.protocol, Protocol::TtFr);
/// assert_eq!(config.home_table(), vec![0, 1, 0, 1]);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub node_count: usize,

    pub wavelength_count: usize,

    pub protocol: Protocol,

    /// Packets a node can hold besides the one in service
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Interarrival gap law of every node's traffic source
    #[serde(default = "default_arrival")]
    pub arrival_distribution: Distribution,

    /// Duration law of a tuning operation (tunable side only)
    #[serde(default = "default_tuning")]
    pub tuning_distribution: Distribution,

    /// Retry delay after losing wavelength contention
    #[serde(default = "default_backoff")]
    pub backoff_distribution: Distribution,

    #[serde(default)]
    pub contention_policy: ContentionPolicy,

    /// Time a packet occupies its wavelength
    #[serde(default = "default_transmission_duration")]
    pub transmission_duration: SimTime,

    #[serde(default)]
    pub propagation_delay: SimTime,

    /// Home wavelength per node; `node % wavelength_count` when absent
    #[serde(default)]
    pub home_wavelengths: Option<Vec<Wavelength>>,

    /// Relative weight of each node as a destination; uniform when absent
    #[serde(default)]
    pub destination_weights: Option<Vec<f64>>,

    /// Slot length of the data ring; continuous time when absent
    #[serde(default)]
    pub data_cycle: Option<SimTime>,

    /// Slot length of the control ring; continuous time when absent
    #[serde(default)]
    pub control_cycle: Option<SimTime>,

    /// Stop once the next event lies beyond this time
    #[serde(default)]
    pub horizon: Option<SimTime>,

    /// Stop once this many packets were delivered
    #[serde(default)]
    pub target_delivered: Option<u64>,

    #[serde(default)]
    pub seed: u64,

    /// Keep a trace of every dispatched event
    #[serde(default)]
    pub record_events: bool,
}

impl NetworkConfig {
    /// Configuration with default traffic and a horizon of 1000
    pub fn new(node_count: usize, wavelength_count: usize, protocol: Protocol) -> Self {
        Self {
            node_count,
            wavelength_count,
            protocol,
            buffer_capacity: default_buffer_capacity(),
            arrival_distribution: default_arrival(),
            tuning_distribution: default_tuning(),
            backoff_distribution: default_backoff(),
            contention_policy: ContentionPolicy::default(),
            transmission_duration: default_transmission_duration(),
            propagation_delay: 0.0,
            home_wavelengths: None,
            destination_weights: None,
            data_cycle: None,
            control_cycle: None,
            horizon: Some(1000.0),
            target_delivered: None,
            seed: 0,
            record_events: false,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Same configuration with a different seed
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }

    /// Check every field; the engine refuses to start on error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_count < 2 {
            return Err(ConfigError::TooFewNodes(self.node_count));
        }
        if self.wavelength_count == 0 {
            return Err(ConfigError::NoWavelengths);
        }

        for (field, law) in [
            ("arrival_distribution", &self.arrival_distribution),
            ("tuning_distribution", &self.tuning_distribution),
            ("backoff_distribution", &self.backoff_distribution),
        ] {
            law.validate()
                .map_err(|source| ConfigError::InvalidDistribution { field, source })?;
        }
        if self.arrival_distribution.is_identically_zero() {
            return Err(ConfigError::InvalidDistribution {
                field: "arrival_distribution",
                source: DistributionError::InvalidParameter {
                    law: self.arrival_distribution.name(),
                    parameter: "mean",
                    value: 0.0,
                },
            });
        }
        if self.contention_policy == ContentionPolicy::Backoff
            && self.backoff_distribution.is_identically_zero()
        {
            return Err(ConfigError::ZeroBackoff);
        }

        check_duration("transmission_duration", self.transmission_duration, true)?;
        check_duration("propagation_delay", self.propagation_delay, false)?;
        if let Some(cycle) = self.data_cycle {
            check_duration("data_cycle", cycle, true)?;
        }
        if let Some(cycle) = self.control_cycle {
            check_duration("control_cycle", cycle, true)?;
        }

        self.validate_homes()?;
        self.validate_weights()?;

        match (self.horizon, self.target_delivered) {
            (None, None) => return Err(ConfigError::NoStopCondition),
            (_, Some(0)) => return Err(ConfigError::ZeroTarget),
            _ => {}
        }
        if let Some(horizon) = self.horizon {
            check_duration("horizon", horizon, false)?;
        }

        Ok(())
    }

    fn validate_homes(&self) -> Result<(), ConfigError> {
        let Some(homes) = &self.home_wavelengths else {
            return Ok(());
        };
        if homes.len() != self.node_count {
            return Err(ConfigError::HomeTableLength {
                expected: self.node_count,
                actual: homes.len(),
            });
        }
        if let Some((node, &wavelength)) = homes
            .iter()
            .enumerate()
            .find(|&(_, &w)| w >= self.wavelength_count)
        {
            return Err(ConfigError::HomeOutOfRange {
                node,
                wavelength,
                wavelength_count: self.wavelength_count,
            });
        }
        Ok(())
    }

    fn validate_weights(&self) -> Result<(), ConfigError> {
        let Some(weights) = &self.destination_weights else {
            return Ok(());
        };
        if weights.len() != self.node_count {
            return Err(ConfigError::WeightsLength {
                expected: self.node_count,
                actual: weights.len(),
            });
        }
        if let Some((node, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(ConfigError::InvalidWeight { node, weight });
        }
        for node in 0..self.node_count {
            let reachable = weights
                .iter()
                .enumerate()
                .any(|(other, &w)| other != node && w > 0.0);
            if !reachable {
                return Err(ConfigError::NoReachableDestination { node });
            }
        }
        Ok(())
    }

    /// Home wavelength of `node`
    pub fn home_wavelength(&self, node: NodeId) -> Wavelength {
        match &self.home_wavelengths {
            Some(homes) => homes
                .get(node)
                .copied()
                .unwrap_or(node % self.wavelength_count.max(1)),
            None => node % self.wavelength_count.max(1),
        }
    }

    /// Home wavelength of every node, in node order
    pub fn home_table(&self) -> Vec<Wavelength> {
        (0..self.node_count).map(|n| self.home_wavelength(n)).collect()
    }

    /// Mean arrival rate of one node, `None` for infinite-mean laws
    pub fn arrival_rate(&self) -> Option<f64> {
        self.arrival_distribution
            .mean()
            .filter(|&mean| mean > 0.0)
            .map(|mean| 1.0 / mean)
    }

    /// SHA-256 of the canonical JSON of this configuration
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        digest::fingerprint(self)
    }
}

fn check_duration(field: &'static str, value: f64, strictly_positive: bool) -> Result<(), ConfigError> {
    let ok = value.is_finite() && if strictly_positive { value > 0.0 } else { value >= 0.0 };
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration {
            field,
            requirement: if strictly_positive {
                "positive"
            } else {
                "non-negative"
            },
            value,
        })
    }
}
