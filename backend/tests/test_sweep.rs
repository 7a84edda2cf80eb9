//! Tests for parallel parameter sweeps
//!
//! A sweep must give exactly the summaries the same runs give one after the
//! other, in request order, whatever the thread count.

use ringsim_core::orchestrator::sweep::{plan, run_requests};
use ringsim_core::{run, run_many, run_pairs, NetworkConfig, Protocol, SweepOptions};

fn base(protocol: Protocol) -> NetworkConfig {
    let mut config = NetworkConfig::new(4, 4, protocol);
    config.propagation_delay = 0.1;
    config.horizon = Some(200.0);
    config
}

fn fingerprints(reports: &[ringsim_core::RunReport]) -> Vec<String> {
    reports
        .iter()
        .map(|r| r.outcome.as_ref().unwrap().fingerprint().unwrap())
        .collect()
}

#[test]
fn test_parallel_matches_sequential() {
    let configs = vec![base(Protocol::FtTr), base(Protocol::TtFr)];
    let seeds = [3, 1, 4, 1, 5];

    let reports = run_many(&configs, &seeds);
    assert_eq!(reports.len(), configs.len() * seeds.len());

    let mut expected = Vec::new();
    for config in &configs {
        for &seed in &seeds {
            let summary = run(&config.with_seed(seed)).unwrap();
            expected.push(summary.fingerprint().unwrap());
        }
    }
    assert_eq!(fingerprints(&reports), expected);
}

#[test]
fn test_reports_keep_request_order() {
    let configs = vec![base(Protocol::TtFr), base(Protocol::FtTr)];
    let seeds = [10, 20, 30];
    let reports = run_many(&configs, &seeds);

    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.run_index, i);
        assert_eq!(report.config_index, i / seeds.len());
        assert_eq!(report.seed, seeds[i % seeds.len()]);

        let summary = report.outcome.as_ref().unwrap();
        assert_eq!(summary.seed, report.seed);
        assert_eq!(summary.protocol, configs[report.config_index].protocol);
    }
}

#[test]
fn test_explicit_pairs() {
    let pairs = vec![
        (base(Protocol::FtTr), 7),
        (base(Protocol::FtTr), 7),
        (base(Protocol::TtFr), 9),
    ];
    let reports = run_pairs(&pairs);
    let prints = fingerprints(&reports);

    // Identical pairs give identical results
    assert_eq!(prints[0], prints[1]);
    assert_ne!(prints[0], prints[2]);
    assert_eq!(reports[2].config_index, 2);
    assert_eq!(reports[0].config_hash, reports[1].config_hash);
    assert_ne!(reports[0].config_hash, reports[2].config_hash);
}

#[test]
fn test_thread_count_does_not_change_results() {
    let requests = plan(&[base(Protocol::FtTr), base(Protocol::TtFr)], &[1, 2, 3, 4]);

    let single = run_requests(&requests, &SweepOptions { threads: Some(1) }).unwrap();
    let several = run_requests(&requests, &SweepOptions { threads: Some(4) }).unwrap();
    let global = run_requests(&requests, &SweepOptions::default()).unwrap();

    assert_eq!(fingerprints(&single), fingerprints(&several));
    assert_eq!(fingerprints(&single), fingerprints(&global));
}

#[test]
fn test_failures_are_isolated() {
    let mut invalid = base(Protocol::FtTr);
    invalid.wavelength_count = 0;

    let reports = run_many(&[base(Protocol::FtTr), invalid, base(Protocol::TtFr)], &[1, 2]);
    assert_eq!(reports.len(), 6);

    for report in &reports {
        if report.config_index == 1 {
            let err = report.outcome.as_ref().unwrap_err();
            assert!(err.is_configuration());
            assert!(!err.is_panic());
            assert_eq!(err.seed, report.seed);
        } else {
            assert!(report.outcome.as_ref().unwrap().is_conserved());
        }
    }
}

#[test]
fn test_empty_sweep() {
    assert!(run_many(&[], &[1, 2]).is_empty());
    assert!(run_many(&[base(Protocol::FtTr)], &[]).is_empty());
}

#[test]
fn test_unbounded_buffer_capacity_completes() {
    let mut config = base(Protocol::TtFr);
    config.buffer_capacity = usize::MAX;
    let reports = run_pairs(&[(config, 11)]);
    assert_eq!(reports.len(), 1);
    assert!(reports[0].outcome.as_ref().unwrap().is_conserved());
}
