//! Metrics Collector Tests

use std::sync::Arc;
use std::thread;

use trueno_ab::MetricsCollector;

fn collector() -> MetricsCollector {
    let collector = MetricsCollector::new();
    collector.register("exp", ["control", "treatment"], &["latency_ms", "score"]);
    collector
}

#[test]
fn test_samples_keep_arrival_order() {
    let collector = collector();
    collector.record("exp", "control", "latency_ms", 100.0).unwrap();
    collector.record("exp", "control", "latency_ms", 200.0).unwrap();

    let snapshot = collector.snapshot("exp").unwrap();
    assert_eq!(snapshot.values("control", "latency_ms"), &[100.0, 200.0]);
    assert!(snapshot.values("treatment", "latency_ms").is_empty());
}

#[test]
fn test_snapshot_is_detached() {
    let collector = collector();
    collector.record("exp", "control", "score", 1.0).unwrap();
    let snapshot = collector.snapshot("exp").unwrap();

    collector.record("exp", "control", "score", 2.0).unwrap();

    assert_eq!(snapshot.values("control", "score").len(), 1);
    assert_eq!(collector.sample_count("exp", "control", "score"), 2);
}

#[test]
fn test_keys_with_underscores_do_not_collide() {
    let collector = MetricsCollector::new();
    collector.register("exp", ["a_b", "a"], &["c", "b_c"]);
    collector.record("exp", "a_b", "c", 1.0).unwrap();

    assert_eq!(collector.sample_count("exp", "a_b", "c"), 1);
    assert_eq!(collector.sample_count("exp", "a", "b_c"), 0);
}

#[test]
fn test_concurrent_writers_lose_nothing() {
    let collector = Arc::new(collector());

    let handles: Vec<_> = (0..50_u32)
        .map(|i| {
            let collector = Arc::clone(&collector);
            thread::spawn(move || {
                collector
                    .record("exp", "treatment", "score", f64::from(i))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(collector.sample_count("exp", "treatment", "score"), 50);
    let mut values = collector
        .snapshot("exp")
        .unwrap()
        .values("treatment", "score")
        .to_vec();
    values.sort_by(f64::total_cmp);
    let expected: Vec<f64> = (0..50_u32).map(f64::from).collect();
    assert_eq!(values, expected);
}

#[test]
fn test_snapshots_during_writes_are_consistent() {
    const WRITERS: u32 = 8;
    const PER_WRITER: u32 = 500;
    let total = (WRITERS * PER_WRITER) as usize;
    let collector = Arc::new(collector());

    let reader = {
        let collector = Arc::clone(&collector);
        thread::spawn(move || {
            let mut previous: Vec<f64> = Vec::new();
            while previous.len() < total {
                let snapshot = collector.snapshot("exp").unwrap();
                let values = snapshot.values("control", "score");
                assert!(values.len() >= previous.len());
                assert_eq!(&values[..previous.len()], previous.as_slice());
                for &value in values {
                    assert_eq!(value.fract(), 0.0, "unexpected value {value}");
                    let (writer, k) = (value as u32 / 1_000, value as u32 % 1_000);
                    assert!(writer < WRITERS && k < PER_WRITER, "unexpected value {value}");
                }
                previous = values.to_vec();
            }
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let collector = Arc::clone(&collector);
            thread::spawn(move || {
                for k in 0..PER_WRITER {
                    collector
                        .record("exp", "control", "score", f64::from(w * 1_000 + k))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(collector.sample_count("exp", "control", "score"), total);
}
