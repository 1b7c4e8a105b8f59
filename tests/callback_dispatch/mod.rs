use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::common::eventually;
use crate::common::start_local_server;
use crate::common::Observed;
use crate::common::WAIT_FOR_DISPATCH;

#[test]
fn test_counter_callback_stops_after_remove() {
    let (runtime, server) = start_local_server();
    let observed = Observed::default();
    server
        .add_record("counter", 0, Some(observed.callback()))
        .unwrap();
    server.start().unwrap();

    runtime.client_put("counter", 1).unwrap();
    assert!(observed.wait_for(1));
    assert_eq!(observed.values(), vec![1]);

    server.remove_record("counter").unwrap();
    assert!(runtime.client_put("counter", 2).is_err());
    assert!(server.notify_write("counter").is_err());

    thread::sleep(Duration::from_millis(100));
    server.stop();
    assert_eq!(observed.count(), 1);
}

#[test]
fn test_duplicate_add_keeps_original_callback() {
    let (runtime, server) = start_local_server();
    let first = Observed::default();
    let second = Observed::default();
    server.add_record("a", 10, Some(first.callback())).unwrap();

    let err = server
        .add_record("a", 20, Some(second.callback()))
        .unwrap_err();
    assert!(err.is_already_exists());
    assert!(server.has_record("a"));

    server.start().unwrap();
    runtime.client_put("a", 11).unwrap();
    assert!(first.wait_for(1));
    server.stop();
    assert_eq!(second.count(), 0);
}

#[test]
fn test_concurrent_writes_on_distinct_channels_all_dispatch() {
    const CHANNELS: usize = 16;
    const WRITES_PER_CHANNEL: usize = 25;

    let (runtime, server) = start_local_server();
    let observers: Vec<Observed> = (0..CHANNELS).map(|_| Observed::default()).collect();
    for (i, observed) in observers.iter().enumerate() {
        server
            .add_record(&format!("ch{i}"), 0, Some(observed.callback()))
            .unwrap();
    }
    server.start().unwrap();

    let writers: Vec<_> = (0..CHANNELS)
        .map(|i| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                for n in 1..=WRITES_PER_CHANNEL {
                    runtime.client_put(&format!("ch{i}"), n as i64).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    for observed in &observers {
        assert!(observed.wait_for(WRITES_PER_CHANNEL));
    }
    server.stop();

    for observed in &observers {
        // one dispatch per write; the last dispatch sees the final value
        assert_eq!(observed.count(), WRITES_PER_CHANNEL);
        assert_eq!(observed.values().last(), Some(&(WRITES_PER_CHANNEL as i64)));
    }
    assert_eq!(
        server.worker_stats().invoked,
        (CHANNELS * WRITES_PER_CHANNEL) as u64
    );
}

#[test]
fn test_remove_races_pending_dispatch_without_crash() {
    let (runtime, server) = start_local_server();
    let observed = Observed::default();

    for round in 0..50 {
        let name = format!("volatile{round}");
        server
            .add_record(&name, 0, Some(observed.callback()))
            .unwrap();
        if round == 0 {
            server.start().unwrap();
        }
        runtime.client_put(&name, round).unwrap();
        server.remove_record(&name).unwrap();
    }

    assert!(eventually(WAIT_FOR_DISPATCH, || server.pending_callbacks() == 0));
    server.stop();

    let stats = server.worker_stats();
    assert_eq!(stats.dispatched, 50);
    assert_eq!(stats.invoked + stats.missing, 50);
}

#[test]
fn test_callback_observes_value_at_dispatch_time() {
    let (runtime, server) = start_local_server();
    let observed = Observed::default();
    server
        .add_record("burst", 0, Some(observed.callback()))
        .unwrap();

    // a stopped runtime rejects clients; writes delivered anyway stay queued
    assert!(runtime.client_put("burst", 1).is_err());
    server.record("burst").unwrap().apply_remote_write(1);
    server.record("burst").unwrap().apply_remote_write(2);
    server.start().unwrap();

    assert!(observed.wait_for(2));
    server.stop();
    assert_eq!(observed.values(), vec![2, 2]);
}

#[test]
fn test_writes_queued_before_stop_are_all_dispatched() {
    const CHANNELS: usize = 8;

    let (runtime, server) = start_local_server();
    let observers: Vec<Observed> = (0..CHANNELS).map(|_| Observed::default()).collect();
    for (i, observed) in observers.iter().enumerate() {
        server
            .add_record(&format!("ch{i}"), 0, Some(observed.callback()))
            .unwrap();
    }
    server.start().unwrap();

    for i in 0..CHANNELS {
        runtime.client_put(&format!("ch{i}"), i as i64).unwrap();
    }
    server.stop();

    for (i, observed) in observers.iter().enumerate() {
        assert_eq!(observed.values(), vec![i as i64]);
    }
    assert_eq!(server.pending_callbacks(), 0);
}
