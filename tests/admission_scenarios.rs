//! Behavioural tests for the admission policy.

use std::sync::{Arc, Barrier};
use std::time::Duration;

use admission_gate::admission::{
    AdmissionPolicy, Clock, DelayAccumulator, Key, ManualClock, RejectReason, Verdict,
    WindowCounter,
};
use admission_gate::config::AdmissionConfig;

mod common;

#[test]
fn test_reference_scenario() {
    let policy = common::manual_policy(5, Duration::from_secs(1), 2, Duration::from_millis(100));
    let key = Key::from("203.0.113.5");
    let t0 = policy.clock().now();

    let verdicts: Vec<Verdict> = (0..6).map(|_| policy.evaluate(&key, t0)).collect();
    assert_eq!(
        verdicts,
        vec![
            Verdict::Allow,
            Verdict::Allow,
            Verdict::AllowWithDelay(Duration::from_millis(100)),
            Verdict::AllowWithDelay(Duration::from_millis(200)),
            Verdict::AllowWithDelay(Duration::from_millis(300)),
            Verdict::Reject(RejectReason::RateLimitExceeded),
        ]
    );
}

#[test]
fn test_default_limits_boundary() {
    let policy = AdmissionPolicy::from_config(&AdmissionConfig::default(), ManualClock::new());
    let key = Key::from("198.51.100.20");
    let now = policy.clock().now();

    for n in 1..=100u64 {
        let verdict = policy.evaluate(&key, now);
        assert!(!verdict.is_rejected(), "request {} was rejected", n);
        match n {
            51 => assert_eq!(verdict, Verdict::AllowWithDelay(Duration::from_millis(500))),
            60 => assert_eq!(verdict, Verdict::AllowWithDelay(Duration::from_millis(5000))),
            n if n <= 50 => assert_eq!(verdict, Verdict::Allow),
            n => assert_eq!(verdict.delay(), Duration::from_millis(500) * (n - 50) as u32),
        }
    }

    assert_eq!(
        policy.evaluate(&key, now),
        Verdict::Reject(RejectReason::RateLimitExceeded)
    );
}

#[test]
fn test_rollover_restores_quota() {
    let window = Duration::from_secs(60);
    let policy = common::manual_policy(3, window, 1, Duration::from_millis(10));
    let clock = policy.clock().clone();
    let key = Key::from("k");

    for _ in 0..5 {
        policy.admit(&key);
    }
    assert!(policy.admit(&key).verdict.is_rejected());

    clock.advance(window);
    let admission = policy.admit(&key);
    assert_eq!(admission.verdict, Verdict::Allow);
    assert_eq!(policy.store().snapshot(&key).unwrap().window.count, 1);
    assert_eq!(admission.quota.remaining, 2);
}

#[test]
fn test_keys_are_isolated() {
    let policy = common::manual_policy(2, Duration::from_secs(60), 1, Duration::from_millis(10));
    let now = policy.clock().now();
    let noisy = Key::from("10.0.0.1");
    let quiet = Key::from("10.0.0.2");

    for _ in 0..10 {
        policy.evaluate(&noisy, now);
    }
    assert!(policy.evaluate(&noisy, now).is_rejected());
    assert_eq!(policy.evaluate(&quiet, now), Verdict::Allow);
    assert_eq!(policy.store().snapshot(&quiet).unwrap().window.count, 1);
}

#[test]
fn test_parallel_requests_same_key_never_drift() {
    let policy = Arc::new(common::manual_policy(
        100,
        Duration::from_secs(900),
        50,
        Duration::from_millis(500),
    ));
    let key = Key::from("shared-nat");
    let now = policy.clock().now();
    let barrier = Arc::new(Barrier::new(200));

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let policy = policy.clone();
            let key = key.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                policy.evaluate(&key, now)
            })
        })
        .collect();

    let verdicts: Vec<Verdict> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let rejected = verdicts.iter().filter(|v| v.is_rejected()).count();
    assert_eq!(rejected, 100);
    assert_eq!(verdicts.len() - rejected, 100);

    let entry = policy.store().snapshot(&key).unwrap();
    assert_eq!(entry.window.count, 200);
    assert_eq!(entry.delay.requests_in_window, 100);

    // Exactly one request got each delay step.
    let mut delays: Vec<Duration> = verdicts.iter().map(Verdict::delay).collect();
    delays.sort();
    delays.dedup();
    assert_eq!(delays.len(), 51);
}

#[test]
fn test_idle_eviction_then_fresh_window() {
    let window = Duration::from_secs(60);
    let policy = common::manual_policy(2, window, 10, Duration::from_millis(10))
        .with_idle_threshold(window * 2);
    let clock = policy.clock().clone();
    let key = Key::from("idle-client");

    policy.admit(&key);
    policy.admit(&key);
    assert!(policy.admit(&key).verdict.is_rejected());

    clock.advance(window * 2 - Duration::from_secs(1));
    assert_eq!(policy.sweep(clock.now()), 0);
    assert!(policy.store().contains(&key));

    // The entry was last touched when the third request was rejected.
    clock.advance(Duration::from_secs(1));
    assert_eq!(policy.sweep(clock.now()), 1);
    assert!(!policy.store().contains(&key));
    assert!(policy.store().is_empty());

    assert_eq!(policy.admit(&key).verdict, Verdict::Allow);
    assert_eq!(policy.store().snapshot(&key).unwrap().window.count, 1);
}

#[test]
fn test_independent_slowdown_window() {
    let policy = AdmissionPolicy::new(
        WindowCounter::new(100, Duration::from_secs(60)),
        DelayAccumulator::new(1, Duration::from_millis(100), Duration::from_secs(10)),
        ManualClock::new(),
    );
    let clock = policy.clock().clone();
    let key = Key::from("k");

    policy.admit(&key);
    assert_eq!(policy.admit(&key).verdict.delay(), Duration::from_millis(100));

    // The slowdown window has rolled over but the counting window has not.
    clock.advance(Duration::from_secs(10));
    assert_eq!(policy.admit(&key).verdict, Verdict::Allow);
    let entry = policy.store().snapshot(&key).unwrap();
    assert_eq!(entry.window.count, 3);
    assert_eq!(entry.delay.requests_in_window, 1);
}

#[test]
fn test_uncapped_delay_keeps_growing() {
    let policy = common::manual_policy(10_000, Duration::from_secs(900), 0, Duration::from_millis(500));
    let key = Key::from("k");
    let now = policy.clock().now();

    let mut last = Duration::ZERO;
    for _ in 0..1_000 {
        last = policy.evaluate(&key, now).delay();
    }
    assert_eq!(last, Duration::from_secs(500));
}

#[test]
fn test_capacity_frees_up_after_windows_expire() {
    let window = Duration::from_secs(30);
    let policy = common::manual_policy(10, window, 10, Duration::from_millis(1))
        .with_max_keys(Some(2));
    let clock = policy.clock().clone();

    policy.admit(&Key::from("a"));
    clock.advance(Duration::from_secs(1));
    policy.admit(&Key::from("b"));
    assert_eq!(
        policy.admit(&Key::from("c")).verdict,
        Verdict::Reject(RejectReason::StoreCapacityExceeded)
    );

    // "a" has aged out of its windows, "b" has not.
    clock.advance(window - Duration::from_secs(1));
    assert_eq!(policy.admit(&Key::from("c")).verdict, Verdict::Allow);
    assert_eq!(policy.store().len(), 2);
    assert!(!policy.store().contains(&Key::from("a")));
    assert!(policy.store().contains(&Key::from("b")));
}
