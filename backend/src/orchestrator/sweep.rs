//! Parallel parameter sweeps
//!
//! Fans independent runs out over a rayon pool. Each run builds its own
//! [`Simulator`](super::engine::Simulator) from its own configuration, so
//! runs share nothing; the only synchronization is rayon's indexed collect,
//! which returns reports in request order whatever order runs finish in.
//!
//! A run that fails or panics is reported in its own slot; its siblings
//! are unaffected.
//!
//! # Example
//!
//! ```rust
//! use ringsim_core::{run_many, NetworkConfig, Protocol};
//!
//! let mut ft = NetworkConfig::new(4, 4, Protocol::FtTr);
//! ft.horizon = Some(20.0);
//! let mut tt = ft.clone();
//! tt.protocol = Protocol::TtFr;
//!
//! let reports = run_many(&[ft, tt], &[1, 2, 3]);
//! assert_eq!(reports.len(), 6);
//! assert_eq!((reports[3].config_index, reports[3].seed), (1, 1));
//! assert!(reports.iter().all(|r| r.outcome.is_ok()));
//! ```

use super::config::NetworkConfig;
use super::engine::{self, SimulationError};
use crate::metrics::Summary;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, info};

/// Knobs of a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOptions {
    /// Worker threads; rayon's global pool when `None`
    pub threads: Option<usize>,
}

/// One planned run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Position of the configuration in the caller's list
    pub config_index: usize,
    pub seed: u64,
    /// Configuration with `seed` already applied
    pub config: NetworkConfig,
}

/// Why a run produced no summary
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("run panicked: {0}")]
    Panicked(String),
}

/// A failed run, with enough context to retry or discard it
#[derive(Debug, Error)]
#[error("run {run_index} (config {config_index}, seed {seed}) failed: {cause}")]
pub struct RunError {
    pub run_index: usize,
    pub config_index: usize,
    pub seed: u64,
    #[source]
    pub cause: RunFailure,
}

impl RunError {
    pub fn is_configuration(&self) -> bool {
        matches!(&self.cause, RunFailure::Simulation(e) if e.is_configuration())
    }

    pub fn is_causality(&self) -> bool {
        matches!(&self.cause, RunFailure::Simulation(e) if e.is_causality())
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.cause, RunFailure::Panicked(_))
    }
}

/// Result of one run, in request order
#[derive(Debug)]
pub struct RunReport {
    pub run_index: usize,
    pub config_index: usize,
    pub seed: u64,
    /// Fingerprint of the configuration actually run
    pub config_hash: Option<String>,
    pub outcome: Result<Summary, RunError>,
}

/// Failure of the sweep machinery itself
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Every `(config, seed)` combination, config-major
pub fn plan(configs: &[NetworkConfig], seeds: &[u64]) -> Vec<RunRequest> {
    configs
        .iter()
        .enumerate()
        .flat_map(|(config_index, config)| {
            seeds.iter().map(move |&seed| RunRequest {
                config_index,
                seed,
                config: config.with_seed(seed),
            })
        })
        .collect()
}

/// Run every `(config, seed)` combination on rayon's global pool
pub fn run_many(configs: &[NetworkConfig], seeds: &[u64]) -> Vec<RunReport> {
    execute(&plan(configs, seeds))
}

/// Run explicit `(config, seed)` pairs on rayon's global pool
///
/// Each pair's position doubles as its config index.
pub fn run_pairs(pairs: &[(NetworkConfig, u64)]) -> Vec<RunReport> {
    let requests: Vec<RunRequest> = pairs
        .iter()
        .enumerate()
        .map(|(config_index, (config, seed))| RunRequest {
            config_index,
            seed: *seed,
            config: config.with_seed(*seed),
        })
        .collect();
    execute(&requests)
}

/// Run planned requests, on a dedicated pool if `options.threads` is set
pub fn run_requests(
    requests: &[RunRequest],
    options: &SweepOptions,
) -> Result<Vec<RunReport>, SweepError> {
    match options.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            Ok(pool.install(|| execute(requests)))
        }
        None => Ok(execute(requests)),
    }
}

fn execute(requests: &[RunRequest]) -> Vec<RunReport> {
    info!(runs = requests.len(), "Starting sweep");

    let reports: Vec<RunReport> = requests
        .par_iter()
        .enumerate()
        .map(|(run_index, request)| run_one(run_index, request))
        .collect();

    let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
    info!(runs = reports.len(), failed, "Sweep finished");
    reports
}

fn run_one(run_index: usize, request: &RunRequest) -> RunReport {
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| engine::run(&request.config))) {
        Ok(Ok(summary)) => Ok(summary),
        Ok(Err(error)) => Err(RunFailure::Simulation(error)),
        Err(payload) => Err(RunFailure::Panicked(panic_message(&*payload))),
    }
    .map_err(|cause| {
        debug!(run_index, seed = request.seed, error = %cause, "Run failed");
        RunError {
            run_index,
            config_index: request.config_index,
            seed: request.seed,
            cause,
        }
    });

    RunReport {
        run_index,
        config_index: request.config_index,
        seed: request.seed,
        config_hash: request.config.fingerprint().ok(),
        outcome,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
