use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;

use crate::queue::SynchronizedQueue;
use crate::ChannelName;
use crate::RecordHandle;
use crate::WriteCallback;
use crate::WriteNotifier;

pub(crate) fn create_test_queue() -> Arc<SynchronizedQueue<ChannelName>> {
    Arc::new(SynchronizedQueue::new())
}

pub(crate) fn create_test_record(
    channel: &str,
    value: i64,
    queue: &Arc<SynchronizedQueue<ChannelName>>,
) -> RecordHandle<i64> {
    RecordHandle::new(
        channel.to_string(),
        value,
        None,
        None,
        WriteNotifier::new(queue.clone()),
    )
}

pub(crate) fn create_test_record_with_callback(
    channel: &str,
    value: i64,
    callback: WriteCallback<i64>,
    queue: &Arc<SynchronizedQueue<ChannelName>>,
) -> RecordHandle<i64> {
    RecordHandle::new(
        channel.to_string(),
        value,
        Some(callback),
        None,
        WriteNotifier::new(queue.clone()),
    )
}

/// Callback that records every value it observes
#[derive(Clone, Default)]
pub(crate) struct CallbackProbe {
    seen: Arc<Mutex<Vec<i64>>>,
    calls: Arc<AtomicUsize>,
}

impl CallbackProbe {
    pub(crate) fn callback(&self) -> WriteCallback<i64> {
        let probe = self.clone();
        WriteCallback::infallible(move |value: &i64| {
            probe.seen.lock().push(*value);
            probe.calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Like [`callback`](Self::callback), but each call takes `delay`
    pub(crate) fn slow_callback(
        &self,
        delay: Duration,
    ) -> WriteCallback<i64> {
        let probe = self.clone();
        WriteCallback::infallible(move |value: &i64| {
            std::thread::sleep(delay);
            probe.seen.lock().push(*value);
            probe.calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<i64> {
        self.seen.lock().clone()
    }

    /// Polls until `expected` calls were observed or `timeout` elapses
    pub(crate) fn wait_for_calls(
        &self,
        expected: usize,
        timeout: Duration,
    ) -> bool {
        wait_until(timeout, || self.calls() >= expected)
    }
}

pub(crate) fn wait_until(
    timeout: Duration,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
