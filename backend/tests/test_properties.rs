//! Property tests over random seeds and small ring configurations
//!
//! Whatever the topology, protocol and seed, a run must dispatch events in
//! time order, keep every buffer within its bound, and account for every
//! generated packet exactly once.

use proptest::prelude::*;
use ringsim_core::{
    run, ContentionPolicy, Distribution, NetworkConfig, Protocol, Simulator, StopReason,
};

fn arb_protocol() -> impl Strategy<Value = Protocol> {
    prop_oneof![Just(Protocol::FtTr), Just(Protocol::TtFr)]
}

fn arb_policy() -> impl Strategy<Value = ContentionPolicy> {
    prop_oneof![Just(ContentionPolicy::Backoff), Just(ContentionPolicy::Drop)]
}

fn arb_config() -> impl Strategy<Value = NetworkConfig> {
    (
        2usize..7,
        1usize..5,
        arb_protocol(),
        arb_policy(),
        0usize..4,
        0.2f64..3.0,
        0.0f64..0.5,
        any::<u64>(),
    )
        .prop_map(
            |(nodes, wavelengths, protocol, policy, capacity, rate, propagation, seed)| {
                let mut config = NetworkConfig::new(nodes, wavelengths, protocol);
                config.contention_policy = policy;
                config.buffer_capacity = capacity;
                config.arrival_distribution = Distribution::Exponential { rate };
                config.propagation_delay = propagation;
                config.horizon = Some(40.0);
                config.seed = seed;
                config.record_events = true;
                config
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_runs_are_causal_and_bounded(config in arb_config()) {
        let capacity = config.buffer_capacity;
        let mut sim = Simulator::new(config).unwrap();

        let mut last = 0.0;
        while let Some(record) = sim.step().unwrap() {
            prop_assert!(record.time >= last);
            last = record.time;
            for node in sim.nodes() {
                prop_assert!(node.buffer.len() <= capacity);
            }
        }
        prop_assert!(sim.event_log().is_causal());
        prop_assert_eq!(sim.stop_reason(), Some(StopReason::Horizon));

        let summary = sim.finish().unwrap();
        prop_assert_eq!(summary.generated, summary.delivered + summary.dropped);
        prop_assert_eq!(summary.drops.total(), summary.dropped);
        for wavelength in &summary.wavelengths {
            prop_assert!(wavelength.utilisation <= 1.0);
            prop_assert!(wavelength.busy_time <= summary.simulated_duration + 1e-9);
        }
    }

    #[test]
    fn prop_fixed_side_never_tunes(config in arb_config()) {
        let protocol = config.protocol;
        let summary = run(&config).unwrap();
        match protocol {
            Protocol::FtTr => prop_assert_eq!(summary.transmitter_tuning.tunings, 0),
            Protocol::TtFr => prop_assert_eq!(summary.receiver_tuning.tunings, 0),
        }
        prop_assert_eq!(summary.drops.protocol_mismatch, 0);
    }

    #[test]
    fn prop_same_seed_same_result(config in arb_config()) {
        let a = run(&config).unwrap();
        let b = run(&config).unwrap();
        prop_assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn prop_backoff_never_drops_for_contention(config in arb_config()) {
        let mut config = config;
        config.contention_policy = ContentionPolicy::Backoff;
        let summary = run(&config).unwrap();
        prop_assert_eq!(summary.drops.contention, 0);
        prop_assert!(summary.is_conserved());
    }
}
