//! Integration tests for the simulation engine
//!
//! These tests drive complete runs through the public API and check the
//! run-level guarantees: packet conservation, causal dispatch, bounded
//! buffers, protocol-specific tuning and reproducibility.

use ringsim_core::{
    run, ClockDomain, ContentionPolicy, Distribution, EventTag, NetworkConfig, Protocol,
    SimulationError, Simulator, StopReason,
};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness; `RUST_LOG=debug` shows drops
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Four nodes on four wavelengths, the reference scenario
fn reference_config(protocol: Protocol) -> NetworkConfig {
    let mut config = NetworkConfig::new(4, 4, protocol);
    config.buffer_capacity = 1;
    config.arrival_distribution = Distribution::Exponential { rate: 1.0 };
    config.propagation_delay = 0.1;
    config.horizon = Some(1000.0);
    config.seed = 42;
    config
}

#[test]
fn test_reference_run_conserves_packets() {
    init_logging();
    for protocol in [Protocol::FtTr, Protocol::TtFr] {
        let summary = run(&reference_config(protocol)).unwrap();

        assert_eq!(summary.protocol, protocol);
        assert_eq!(summary.stop_reason, StopReason::Horizon);
        assert_eq!(summary.simulated_duration, 1000.0);
        assert!(summary.generated > 0);
        assert_eq!(summary.generated, summary.delivered + summary.dropped);
        assert!(summary.is_conserved());
        assert!(summary.throughput > 0.0);
        assert!(summary.mean_transfer_delay.is_some());
    }
}

#[test]
fn test_transfer_delay_covers_transmission_and_propagation() {
    let config = reference_config(Protocol::FtTr);
    let summary = run(&config).unwrap();

    let floor = config.transmission_duration + config.propagation_delay;
    let mean = summary.mean_transfer_delay.unwrap();
    assert!(mean >= floor - 1e-9, "mean delay {mean} below {floor}");
    assert!(summary.max_transfer_delay.unwrap() >= mean);
    assert!(
        (summary.total_transfer_delay - mean * summary.delivered as f64).abs() < 1e-6
    );
}

#[test]
fn test_ft_tr_only_receivers_tune() {
    let summary = run(&reference_config(Protocol::FtTr)).unwrap();
    assert_eq!(summary.transmitter_tuning.tunings, 0);
    assert_eq!(summary.transmitter_tuning.tuning_time, 0.0);
    assert!(summary.receiver_tuning.tunings > 0);
    assert!(summary.receiver_tuning.tuning_time > 0.0);
}

#[test]
fn test_tt_fr_only_transmitters_tune() {
    let summary = run(&reference_config(Protocol::TtFr)).unwrap();
    assert_eq!(summary.receiver_tuning.tunings, 0);
    assert_eq!(summary.receiver_tuning.tuning_time, 0.0);
    assert!(summary.transmitter_tuning.tunings > 0);
    assert!(summary.transmitter_tuning.tuning_time > 0.0);
}

#[test]
fn test_default_homes_never_mismatch() {
    for protocol in [Protocol::FtTr, Protocol::TtFr] {
        let summary = run(&reference_config(protocol)).unwrap();
        assert_eq!(summary.drops.protocol_mismatch, 0);
    }
}

#[test]
fn test_zero_capacity_drops_arrivals_while_busy() {
    init_logging();
    let mut config = reference_config(Protocol::TtFr);
    config.buffer_capacity = 0;

    let mut sim = Simulator::new(config).unwrap();
    while sim.step().unwrap().is_some() {
        for node in sim.nodes() {
            assert!(node.buffer.is_empty());
        }
    }
    let summary = sim.finish().unwrap();

    assert!(summary.drops.buffer_overflow > 0);
    assert!(summary.delivered > 0);
    assert!(summary.is_conserved());
    assert!(summary.nodes.iter().all(|n| n.peak_buffer == 0));
}

#[test]
fn test_buffers_stay_within_capacity() {
    let mut config = reference_config(Protocol::FtTr);
    config.buffer_capacity = 3;
    config.arrival_distribution = Distribution::Exponential { rate: 8.0 };
    config.horizon = Some(200.0);

    let mut sim = Simulator::new(config).unwrap();
    while sim.step().unwrap().is_some() {
        for node in sim.nodes() {
            assert!(node.buffer.len() <= 3, "node {} over capacity", node.id());
        }
    }
    let summary = sim.finish().unwrap();
    assert!(summary.nodes.iter().any(|n| n.peak_buffer == 3));
    assert!(summary.drops.buffer_overflow > 0);
}

#[test]
fn test_dispatch_is_causal() {
    let mut config = reference_config(Protocol::TtFr);
    config.record_events = true;
    config.horizon = Some(300.0);

    let mut sim = Simulator::new(config).unwrap();
    let mut last = 0.0;
    while let Some(record) = sim.step().unwrap() {
        assert!(record.time >= last);
        last = record.time;
        assert_eq!(sim.now(), record.time);
    }
    assert!(sim.event_log().is_causal());
    assert!(sim.clock(ClockDomain::Data).now() <= sim.now());
    assert!(sim.clock(ClockDomain::Control).now() <= sim.now());

    let logged = sim.event_log().len() as u64;
    let summary = sim.finish().unwrap();
    assert_eq!(summary.events.total(), logged);
}

#[test]
fn test_event_log_off_by_default() {
    let mut config = reference_config(Protocol::FtTr);
    config.horizon = Some(20.0);
    let mut sim = Simulator::new(config).unwrap();
    sim.run().unwrap();
    assert!(sim.event_log().is_empty());
}

#[test]
fn test_same_seed_same_summary() {
    let config = reference_config(Protocol::FtTr);
    let a = run(&config).unwrap();
    let b = run(&config).unwrap();

    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}

#[test]
fn test_seeds_vary_but_agree_on_throughput() {
    let mut config = NetworkConfig::new(4, 4, Protocol::TtFr);
    config.arrival_distribution = Distribution::Exponential { rate: 0.1 };
    config.buffer_capacity = 16;
    config.horizon = Some(5000.0);

    let summaries: Vec<_> = [1, 2, 3]
        .iter()
        .map(|&seed| run(&config.with_seed(seed)).unwrap())
        .collect();

    assert_ne!(summaries[0].generated, summaries[1].generated);
    assert_ne!(summaries[0].fingerprint().unwrap(), summaries[2].fingerprint().unwrap());

    // Light load: almost everything offered gets through
    for summary in &summaries {
        assert!(
            (0.3..0.5).contains(&summary.throughput),
            "throughput {}",
            summary.throughput
        );
        assert_eq!(summary.drops.buffer_overflow, 0);
    }
}

#[test]
fn test_target_delivered_stops_run() {
    let mut config = reference_config(Protocol::TtFr);
    config.horizon = None;
    config.target_delivered = Some(50);

    let summary = run(&config).unwrap();
    assert_eq!(summary.stop_reason, StopReason::TargetDelivered);
    assert_eq!(summary.delivered, 50);
    assert!(summary.is_conserved());
}

#[test]
fn test_finish_early_reports_halted() {
    let mut sim = Simulator::new(reference_config(Protocol::FtTr)).unwrap();
    for _ in 0..25 {
        sim.step().unwrap();
    }
    assert!(!sim.is_stopped());
    let now = sim.now();

    let summary = sim.finish().unwrap();
    assert_eq!(summary.stop_reason, StopReason::Halted);
    assert_eq!(summary.simulated_duration, now);
    assert!(summary.is_conserved());
}

#[test]
fn test_drop_policy_loses_contended_packets() {
    init_logging();
    // Every transmitter shares the single wavelength
    let mut config = NetworkConfig::new(4, 1, Protocol::FtTr);
    config.contention_policy = ContentionPolicy::Drop;
    config.buffer_capacity = 8;
    config.horizon = Some(1000.0);
    config.seed = 5;

    let summary = run(&config).unwrap();
    assert!(summary.drops.contention > 0);
    assert!(summary.is_conserved());
    assert_eq!(summary.receiver_tuning.tunings, 0);
}

#[test]
fn test_backoff_policy_retries_instead_of_dropping() {
    let mut config = NetworkConfig::new(4, 1, Protocol::FtTr);
    config.buffer_capacity = 8;
    config.horizon = Some(1000.0);
    config.seed = 5;

    let summary = run(&config).unwrap();
    assert_eq!(summary.drops.contention, 0);
    assert!(summary.transmitter_tuning.deferrals > 0);
    assert!(summary.is_conserved());
}

#[test]
fn test_slotted_data_ring_aligns_transmissions() {
    let mut config = reference_config(Protocol::FtTr);
    config.data_cycle = Some(0.5);
    config.horizon = Some(200.0);
    config.record_events = true;

    let mut sim = Simulator::new(config).unwrap();
    sim.run().unwrap();

    let starts = sim.event_log().records_of_kind(EventTag::TransmitStart);
    assert!(!starts.is_empty());
    for record in starts {
        assert_eq!((record.time / 0.5).fract(), 0.0, "start at {}", record.time);
    }
    assert!(sim.finish().unwrap().is_conserved());
}

#[test]
fn test_slotted_control_ring_aligns_tuning() {
    let mut config = reference_config(Protocol::TtFr);
    config.control_cycle = Some(0.25);
    config.horizon = Some(200.0);
    config.record_events = true;

    let mut sim = Simulator::new(config).unwrap();
    sim.run().unwrap();

    let tunes = sim.event_log().records_of_kind(EventTag::TuneStart);
    assert!(!tunes.is_empty());
    for record in tunes {
        assert_eq!((record.time / 0.25).fract(), 0.0, "tune at {}", record.time);
    }
}

#[test]
fn test_per_node_figures_add_up() {
    let summary = run(&reference_config(Protocol::TtFr)).unwrap();

    let generated: u64 = summary.nodes.iter().map(|n| n.generated).sum();
    let delivered: u64 = summary.nodes.iter().map(|n| n.delivered).sum();
    let received: u64 = summary.nodes.iter().map(|n| n.received).sum();
    assert_eq!(generated, summary.generated);
    assert_eq!(delivered, summary.delivered);
    assert_eq!(received, summary.delivered);

    assert_eq!(summary.latency.total(), summary.delivered);
    for node in 0..4 {
        assert_eq!(summary.latency.get(node, node), None);
    }

    let transmissions: u64 = summary.wavelengths.iter().map(|w| w.transmissions).sum();
    assert!(transmissions >= summary.delivered);
    assert!(summary
        .wavelengths
        .iter()
        .all(|w| (0.0..=1.0).contains(&w.utilisation)));
}

#[test]
fn test_custom_home_table() {
    let mut config = NetworkConfig::new(6, 2, Protocol::TtFr);
    config.home_wavelengths = Some(vec![0, 0, 0, 1, 1, 1]);
    config.horizon = Some(300.0);
    config.seed = 8;

    let summary = run(&config).unwrap();
    let homes: Vec<usize> = summary.nodes.iter().map(|n| n.home_wavelength).collect();
    assert_eq!(homes, vec![0, 0, 0, 1, 1, 1]);
    assert!(summary.wavelengths.iter().all(|w| w.transmissions > 0));
    assert!(summary.is_conserved());
}

#[test]
fn test_invalid_config_fails_before_running() {
    let mut config = reference_config(Protocol::FtTr);
    config.arrival_distribution = Distribution::Exponential { rate: -1.0 };
    let err = run(&config).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, SimulationError::Config(_)));

    let mut config = reference_config(Protocol::FtTr);
    config.horizon = None;
    assert!(run(&config).unwrap_err().is_configuration());
}

#[test]
fn test_config_from_json() {
    let config = NetworkConfig::from_json_str(
        r#"{
            "node_count": 4,
            "wavelength_count": 4,
            "protocol": "FT_TR",
            "propagation_delay": 0.1,
            "horizon": 100.0,
            "seed": 42
        }"#,
    )
    .unwrap();
    assert_eq!(config.buffer_capacity, 1);
    assert_eq!(config.contention_policy, ContentionPolicy::Backoff);

    let summary = run(&config).unwrap();
    assert!(summary.is_conserved());
    assert!(summary.estimate.is_some());
}

#[test]
fn test_unbounded_buffer_capacity_runs() {
    init_logging();
    let mut config = reference_config(Protocol::FtTr);
    config.buffer_capacity = usize::MAX;
    config.horizon = Some(100.0);
    assert!(config.validate().is_ok());

    let summary = run(&config).unwrap();
    assert!(summary.is_conserved());
    assert_eq!(summary.drops.buffer_overflow, 0);
}

#[test]
fn test_utilisation_bounded_when_transmissions_straddle_horizon() {
    // Transmissions far longer than the arrival gap keep one wavelength
    // permanently busy, with the last one still on air at the horizon.
    for seed in 0..50 {
        let mut config = NetworkConfig::new(4, 1, Protocol::FtTr);
        config.arrival_distribution = Distribution::Exponential { rate: 50.0 };
        config.transmission_duration = 0.7;
        config.horizon = Some(1.0);
        config.seed = seed;

        let summary = run(&config).unwrap();
        for wavelength in &summary.wavelengths {
            assert!(
                wavelength.utilisation <= 1.0,
                "seed {seed}: utilisation {}",
                wavelength.utilisation
            );
            assert!(wavelength.busy_time <= summary.simulated_duration + 1e-9);
        }
    }
}
