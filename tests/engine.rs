//! End-to-end tests for the stats engine over a scripted counter source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use netmon::source::CounterSource;
use netmon::stats::{merge_snapshots, Counters, SampleError, StatsEngine, SERIES_LEN};

/// In-memory counter source whose readings the test controls between ticks.
#[derive(Clone, Default)]
struct FakeSource {
    readings: Arc<Mutex<HashMap<String, Counters>>>,
}

impl FakeSource {
    fn new() -> Self {
        Self::default()
    }

    fn set(&self, name: &str, counters: Counters) {
        self.readings
            .lock()
            .unwrap()
            .insert(name.to_string(), counters);
    }

    fn remove(&self, name: &str) {
        self.readings.lock().unwrap().remove(name);
    }
}

impl CounterSource for FakeSource {
    fn counters(&mut self, name: &str) -> Option<Counters> {
        self.readings.lock().unwrap().get(name).copied()
    }
}

fn tx_packets(n: u64) -> Counters {
    Counters {
        tx_packets: n,
        ..Counters::default()
    }
}

#[test]
fn first_sample_yields_zero_delta() {
    let source = FakeSource::new();
    source.set("eth0", tx_packets(1_000_000));
    let mut engine = StatsEngine::new(source);

    let stats = engine.sample("eth0").unwrap();
    assert_eq!(stats.delta, Counters::default());
}

#[test]
fn deltas_match_differences_between_readings() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());

    let readings = [100u64, 130, 130, 500, 501];
    let mut deltas = Vec::new();
    for r in readings {
        source.set("eth0", tx_packets(r));
        deltas.push(engine.sample("eth0").unwrap().delta.tx_packets);
    }
    assert_eq!(deltas, vec![0, 30, 0, 370, 1]);
}

#[test]
fn eth0_three_tick_scenario() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());

    source.set("eth0", tx_packets(1000));
    assert_eq!(engine.sample("eth0").unwrap().delta.tx_packets, 0);
    source.set("eth0", tx_packets(1050));
    assert_eq!(engine.sample("eth0").unwrap().delta.tx_packets, 50);
    source.set("eth0", tx_packets(1200));
    let stats = engine.sample("eth0").unwrap();
    assert_eq!(stats.delta.tx_packets, 150);

    // Newest-first: [150, 50, 0, 0, ...].
    let series = &stats.series.tx_packets;
    assert_eq!(series.len(), SERIES_LEN);
    assert_eq!(&series[..3], &[150.0, 50.0, 0.0]);
    assert!(series[3..].iter().all(|&v| v == 0.0));
}

#[test]
fn wrapped_counter_yields_wrapped_delta() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());

    source.set("eth0", tx_packets(u64::MAX - 9));
    engine.sample("eth0").unwrap();
    source.set("eth0", tx_packets(10));
    assert_eq!(engine.sample("eth0").unwrap().delta.tx_packets, 20);
}

#[test]
fn unknown_interface_fails_without_touching_state() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());

    assert_eq!(
        engine.sample("eth0"),
        Err(SampleError::SourceUnavailable("eth0".to_string()))
    );

    // The failed call left no baseline behind: the next successful sample is
    // still a first sample, and its history starts from an all-zero buffer.
    source.set("eth0", tx_packets(4000));
    let stats = engine.sample("eth0").unwrap();
    assert_eq!(stats.delta, Counters::default());
    assert!(stats.series.tx_packets.iter().all(|&v| v == 0.0));
}

#[test]
fn interface_vanishing_mid_run_is_skipped_until_it_returns() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());
    let names = vec!["eth0".to_string(), "wlan0".to_string()];

    source.set("eth0", tx_packets(10));
    source.set("wlan0", tx_packets(20));
    assert_eq!(engine.sample_all(&names).len(), 2);

    source.remove("wlan0");
    source.set("eth0", tx_packets(15));
    let snapshots = engine.sample_all(&names);
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].name, "eth0");
    assert_eq!(snapshots[0].delta.tx_packets, 5);

    // Back next tick, with its old baseline still in place.
    source.set("wlan0", tx_packets(26));
    source.set("eth0", tx_packets(15));
    let snapshots = engine.sample_all(&names);
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].name, "eth0");
    assert_eq!(snapshots[1].name, "wlan0");
    assert_eq!(snapshots[1].delta.tx_packets, 6);
}

#[test]
fn published_snapshots_survive_a_failed_read() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());
    let names = vec!["eth0".to_string(), "wlan0".to_string()];

    source.set("eth0", tx_packets(10));
    source.set("wlan0", tx_packets(20));
    let mut published = merge_snapshots(&names, &[], engine.sample_all(&names));
    source.set("eth0", tx_packets(15));
    source.set("wlan0", tx_packets(29));
    published = merge_snapshots(&names, &published, engine.sample_all(&names));
    assert_eq!(published[1].delta.tx_packets, 9);

    // wlan0 becomes unreadable for one tick: its last snapshot stays
    // published, in configured order, so its table and graph do not vanish.
    source.remove("wlan0");
    source.set("eth0", tx_packets(21));
    published = merge_snapshots(&names, &published, engine.sample_all(&names));
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].name, "eth0");
    assert_eq!(published[0].delta.tx_packets, 6);
    assert_eq!(published[1].name, "wlan0");
    assert_eq!(published[1].delta.tx_packets, 9);

    // Next tick it reads again, against its old baseline.
    source.set("wlan0", tx_packets(30));
    published = merge_snapshots(&names, &published, engine.sample_all(&names));
    assert_eq!(published[1].delta.tx_packets, 1);
}

#[test]
fn sample_all_keeps_configured_order() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());
    let names = vec!["wlan0".to_string(), "eth0".to_string(), "lo".to_string()];
    for name in &names {
        source.set(name, tx_packets(1));
    }
    let order: Vec<String> = engine
        .sample_all(&names)
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(order, names);
}

#[test]
fn reset_erases_baselines_and_history_jointly() {
    let source = FakeSource::new();
    let mut engine = StatsEngine::new(source.clone());

    source.set("eth0", tx_packets(1000));
    engine.sample("eth0").unwrap();
    source.set("eth0", tx_packets(1500));
    engine.sample("eth0").unwrap();

    engine.reset();

    // History is gone and the next sample is a first sample again, even
    // though the kernel counter kept growing in the meantime.
    source.set("eth0", tx_packets(9000));
    let stats = engine.sample("eth0").unwrap();
    assert_eq!(stats.delta, Counters::default());
    assert!(stats.series.tx_packets.iter().all(|&v| v == 0.0));
}

#[test]
fn reset_between_ticks_from_another_thread() {
    let source = FakeSource::new();
    let engine = Arc::new(Mutex::new(StatsEngine::new(source.clone())));
    let names = vec!["eth0".to_string(), "wlan0".to_string()];

    source.set("eth0", tx_packets(100));
    source.set("wlan0", tx_packets(200));
    engine.lock().unwrap().sample_all(&names);
    source.set("eth0", tx_packets(150));
    source.set("wlan0", tx_packets(260));
    engine.lock().unwrap().sample_all(&names);

    // Reset issued from the UI thread strictly between two ticks.
    let resetter = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.lock().unwrap().reset())
    };
    resetter.join().unwrap();

    let snapshots = engine.lock().unwrap().sample_all(&names);
    for stats in snapshots {
        assert_eq!(stats.delta, Counters::default());
        assert!(stats.series.tx_packets.iter().all(|&v| v == 0.0));
    }
}
