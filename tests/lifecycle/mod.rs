use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use pva_server::LocalServingRuntime;
use pva_server::PvaServer;
use pva_server::ServingRuntime;
use pva_server::WorkerState;
use pva_server::WriteCallback;

use crate::common::eventually;
use crate::common::start_local_server;
use crate::common::test_config;
use crate::common::Observed;
use crate::common::SHUTDOWN_WAIT_TIME_IN_MS;
use crate::common::WAIT_FOR_DISPATCH;

// scheduling slack on top of the configured bounds
const SLACK: Duration = Duration::from_millis(500);

#[test]
fn test_stop_on_idle_server_is_bounded_regardless_of_update_timeout() {
    let runtime = Arc::new(LocalServingRuntime::<i64>::new());
    let mut config = test_config();
    config.worker.record_update_timeout_ms = 60_000;
    let server = PvaServer::with_config(runtime, config).unwrap();
    server.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    server.stop();

    assert!(started.elapsed() < Duration::from_millis(SHUTDOWN_WAIT_TIME_IN_MS) + SLACK);
    assert_eq!(server.worker_state(), WorkerState::NotRunning);
}

#[test]
fn test_stop_with_stuck_callback_gives_up_after_wait_time() {
    let (runtime, server) = start_local_server();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    server
        .add_record(
            "stuck",
            0,
            Some(WriteCallback::infallible(move |_: &i64| {
                let _ = entered_tx.lock().send(());
                let _ = release_rx.lock().recv_timeout(Duration::from_secs(10));
            })),
        )
        .unwrap();
    server.start().unwrap();
    runtime.client_put("stuck", 1).unwrap();
    entered_rx.recv_timeout(Duration::from_secs(3)).unwrap();

    let started = Instant::now();
    server.stop();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(SHUTDOWN_WAIT_TIME_IN_MS));
    assert!(elapsed < Duration::from_millis(SHUTDOWN_WAIT_TIME_IN_MS) + SLACK);
    assert!(!server.is_running());
    let _ = release_tx.send(());
}

#[test]
fn test_restart_serves_records_again() {
    let runtime = Arc::new(LocalServingRuntime::<i64>::new());
    let mut config = test_config();
    config.registry.detach_records_on_stop = false;
    let server = PvaServer::with_config(runtime.clone(), config).unwrap();
    let observed = Observed::default();
    server.add_record("a", 0, Some(observed.callback())).unwrap();

    server.start().unwrap();
    runtime.client_put("a", 1).unwrap();
    assert!(observed.wait_for(1));
    server.stop();
    assert!(runtime.client_get("a").is_err());

    server.start().unwrap();
    runtime.client_put("a", 2).unwrap();
    assert!(observed.wait_for(2));
    assert_eq!(runtime.client_get("a").unwrap(), 2);
    server.stop();
}

#[test]
fn test_default_stop_tears_registry_down() {
    let (runtime, server) = start_local_server();
    server.add_record("a", 0, None).unwrap();
    server.start().unwrap();

    server.stop();

    assert!(server.record_names().is_empty());
    assert!(runtime.attached_channels().is_empty());
}

#[test]
fn test_restart_after_abandoned_stop_never_overlaps_callbacks() {
    let runtime = Arc::new(LocalServingRuntime::<i64>::new());
    let mut config = test_config();
    config.worker.shutdown_wait_time_ms = 50;
    config.registry.detach_records_on_stop = false;
    let server = PvaServer::with_config(runtime.clone(), config).unwrap();

    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let callback = {
        let active = active.clone();
        let max_active = max_active.clone();
        let calls = calls.clone();
        WriteCallback::infallible(move |_: &i64| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(400));
            active.fetch_sub(1, Ordering::SeqCst);
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    server.add_record("slow", 0, Some(callback)).unwrap();
    server.start().unwrap();
    runtime.client_put("slow", 1).unwrap();
    assert!(eventually(WAIT_FOR_DISPATCH, || active.load(Ordering::SeqCst) == 1));

    server.stop();
    assert!(server.start().is_err());
    assert!(!server.is_running());
    assert!(!runtime.is_serving());

    assert!(eventually(WAIT_FOR_DISPATCH, || server.start().is_ok()));
    runtime.client_put("slow", 2).unwrap();
    assert!(eventually(WAIT_FOR_DISPATCH, || calls.load(Ordering::SeqCst) == 2));
    server.stop();

    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_while_running_tears_everything_down() {
    let (runtime, server) = start_local_server();
    server.add_record("a", 0, None).unwrap();
    server.add_record("b", 0, None).unwrap();
    server.start().unwrap();

    drop(server);

    assert!(!runtime.is_serving());
    assert!(runtime.attached_channels().is_empty());
}

#[test]
fn test_admin_operations_from_many_threads() {
    let (runtime, server) = start_local_server();
    let server = Arc::new(server);
    server.start().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let server = Arc::clone(&server);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let name = format!("t{t}/r{i}");
                    server.add_record(&name, i, None).unwrap();
                    server.update_record_named(&name, i * 2).unwrap();
                    if i % 5 == 0 {
                        server.remove_record(&name).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(server.record_names().len(), 8 * 40);
    assert_eq!(runtime.client_get("t3/r7").unwrap(), 14);
    server.stop();
}
