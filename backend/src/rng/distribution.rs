//! Statistical laws for interarrival gaps, tuning durations and backoff
//!
//! A [`Distribution`] is plain, validated data (it lives in the run
//! configuration). A [`Sampler`] binds a law to one seeded stream and is
//! the only thing that actually draws variates.

use super::xorshift::RngManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A law was given a parameter outside its domain
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("invalid {parameter} for {law} distribution: {value}")]
    InvalidParameter {
        law: &'static str,
        parameter: &'static str,
        value: f64,
    },
}

/// A non-negative random law
///
/// # Example
/// ```
/// use ringsim_core::Distribution;
///
/// let law: Distribution =
///     serde_json::from_str(r#"{"kind": "exponential", "rate": 2.0}"#).unwrap();
/// assert_eq!(law.mean(), Some(0.5));
/// assert!(Distribution::Exponential { rate: -1.0 }.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Memoryless gaps with mean `1 / rate`
    Exponential { rate: f64 },

    /// `position + Exp(rate)`: exponential shifted by a fixed minimum
    BiasedExponential { position: f64, rate: f64 },

    /// Heavy-tailed gaps with minimum `scale`
    Pareto { shape: f64, scale: f64 },

    Uniform { min: f64, max: f64 },

    Constant { value: f64 },
}

impl Distribution {
    /// Short lowercase name of the law
    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Exponential { .. } => "exponential",
            Distribution::BiasedExponential { .. } => "biased_exponential",
            Distribution::Pareto { .. } => "pareto",
            Distribution::Uniform { .. } => "uniform",
            Distribution::Constant { .. } => "constant",
        }
    }

    /// Check every parameter lies in the law's domain
    pub fn validate(&self) -> Result<(), DistributionError> {
        let law = self.name();
        let positive = |parameter: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(DistributionError::InvalidParameter {
                    law,
                    parameter,
                    value,
                })
            }
        };
        let non_negative = |parameter: &'static str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(DistributionError::InvalidParameter {
                    law,
                    parameter,
                    value,
                })
            }
        };

        match *self {
            Distribution::Exponential { rate } => positive("rate", rate),
            Distribution::BiasedExponential { position, rate } => {
                non_negative("position", position)?;
                positive("rate", rate)
            }
            Distribution::Pareto { shape, scale } => {
                positive("shape", shape)?;
                positive("scale", scale)
            }
            Distribution::Uniform { min, max } => {
                non_negative("min", min)?;
                non_negative("max", max)?;
                if max < min {
                    return Err(DistributionError::InvalidParameter {
                        law,
                        parameter: "max",
                        value: max,
                    });
                }
                Ok(())
            }
            Distribution::Constant { value } => non_negative("value", value),
        }
    }

    /// Expected value, `None` when it is infinite
    pub fn mean(&self) -> Option<f64> {
        match *self {
            Distribution::Exponential { rate } => Some(1.0 / rate),
            Distribution::BiasedExponential { position, rate } => Some(position + 1.0 / rate),
            Distribution::Pareto { shape, scale } => {
                if shape > 1.0 {
                    Some(shape * scale / (shape - 1.0))
                } else {
                    None
                }
            }
            Distribution::Uniform { min, max } => Some((min + max) / 2.0),
            Distribution::Constant { value } => Some(value),
        }
    }

    /// True if every draw is exactly zero
    pub fn is_identically_zero(&self) -> bool {
        match *self {
            Distribution::Uniform { max, .. } => max == 0.0,
            Distribution::Constant { value } => value == 0.0,
            _ => false,
        }
    }

    /// Draw one variate from `rng`. The law must already be validated.
    pub fn sample_with(&self, rng: &mut RngManager) -> f64 {
        match *self {
            Distribution::Exponential { rate } => exponential(rng, rate),
            Distribution::BiasedExponential { position, rate } => {
                position + exponential(rng, rate)
            }
            Distribution::Pareto { shape, scale } => {
                let u = rng.next_f64();
                scale * (1.0 - u).powf(-1.0 / shape)
            }
            Distribution::Uniform { min, max } => min + rng.next_f64() * (max - min),
            Distribution::Constant { value } => value,
        }
    }
}

fn exponential(rng: &mut RngManager, rate: f64) -> f64 {
    // 1 - u lies in (0, 1], so the log is finite
    -(1.0 - rng.next_f64()).ln() / rate
}

/// A validated law bound to its own random stream
#[derive(Debug, Clone)]
pub struct Sampler {
    law: Distribution,
    rng: RngManager,
    draws: u64,
}

impl Sampler {
    /// Bind `law` to `rng`, rejecting invalid parameters
    pub fn new(law: Distribution, rng: RngManager) -> Result<Self, DistributionError> {
        law.validate()?;
        Ok(Self { law, rng, draws: 0 })
    }

    /// Bind `law` to a fresh stream seeded with `seed`
    pub fn seeded(law: Distribution, seed: u64) -> Result<Self, DistributionError> {
        Self::new(law, RngManager::new(seed))
    }

    /// Next non-negative variate
    pub fn sample(&mut self) -> f64 {
        self.draws += 1;
        self.law.sample_with(&mut self.rng)
    }

    pub fn law(&self) -> &Distribution {
        &self.law
    }

    /// Number of variates drawn so far
    pub fn draws(&self) -> u64 {
        self.draws
    }
}
