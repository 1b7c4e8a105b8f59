use std::any::Any;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::constants::OUTCOME_FAILED;
use crate::constants::OUTCOME_INVOKED;
use crate::constants::OUTCOME_MISSING;
use crate::constants::OUTCOME_NO_CALLBACK;
use crate::metrics::CALLBACK_DISPATCH_TOTAL;
use crate::metrics::CALLBACK_LATENCY_MS;
use crate::metrics::CALLBACK_QUEUE_DEPTH;
use crate::queue::SynchronizedQueue;
use crate::CallbackWorkerConfig;
use crate::ChannelName;
use crate::RecordRegistry;
use crate::RecordValue;
use crate::Result;
use crate::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    NotRunning,
    Running,
    ShuttingDown,
}

/// Dispatch counters accumulated over the worker's lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Queue entries taken by the worker
    pub dispatched: u64,
    /// Callbacks that ran to completion
    pub invoked: u64,
    /// Entries whose channel was no longer registered
    pub missing: u64,
    /// Entries for records without a callback
    pub no_callback: u64,
    /// Callbacks that returned an error or panicked
    pub failed: u64,
}

#[derive(Default)]
struct StatsCounters {
    dispatched: AtomicU64,
    invoked: AtomicU64,
    missing: AtomicU64,
    no_callback: AtomicU64,
    failed: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            invoked: self.invoked.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            no_callback: self.no_callback.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Set once by the worker thread on its way out
#[derive(Default)]
struct ExitSignal {
    exited: Mutex<bool>,
    cv: Condvar,
}

impl ExitSignal {
    fn notify(&self) {
        *self.exited.lock() = true;
        self.cv.notify_all();
    }

    /// Returns true if the worker exited within `timeout`
    fn wait(
        &self,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        let mut exited = self.exited.lock();
        while !*exited {
            if self.cv.wait_until(&mut exited, deadline).timed_out() {
                return *exited;
            }
        }
        true
    }
}

/// Fires the exit signal even if the loop unwinds
struct ExitGuard(Arc<ExitSignal>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.notify();
    }
}

/// A thread that did not exit within the shutdown wait time
struct AbandonedWorker {
    exit: Arc<ExitSignal>,
    handle: JoinHandle<()>,
}

struct WorkerSlot {
    state: WorkerState,
    stop_flag: Option<Arc<AtomicBool>>,
    exit: Option<Arc<ExitSignal>>,
    handle: Option<JoinHandle<()>>,
    abandoned: Option<AbandonedWorker>,
}

/// Owns the lifecycle of the single callback dispatch thread.
pub struct CallbackWorker<V: RecordValue> {
    queue: Arc<SynchronizedQueue<ChannelName>>,
    registry: Arc<RecordRegistry<V>>,
    config: CallbackWorkerConfig,
    /// Serializes start/stop so a start never races a shutdown in progress
    lifecycle: Mutex<()>,
    slot: Mutex<WorkerSlot>,
    stats: Arc<StatsCounters>,
}

impl<V: RecordValue> CallbackWorker<V> {
    pub fn new(
        queue: Arc<SynchronizedQueue<ChannelName>>,
        registry: Arc<RecordRegistry<V>>,
        config: CallbackWorkerConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            config,
            lifecycle: Mutex::new(()),
            slot: Mutex::new(WorkerSlot {
                state: WorkerState::NotRunning,
                stop_flag: None,
                exit: None,
                handle: None,
                abandoned: None,
            }),
            stats: Arc::new(StatsCounters::default()),
        }
    }

    /// Spawns the worker thread.
    ///
    /// Calling `start()` while the worker is running is a no-op. Entries queued
    /// before the start are dispatched once the thread is up. If an earlier
    /// `stop()` gave up on the thread, `start()` first waits up to
    /// `shutdown_wait_time` for it to exit.
    ///
    /// # Errors
    /// - `WorkerError::PreviousWorkerAlive` if the abandoned thread is still
    ///   running after that wait.
    /// - `WorkerError::StartFailure` if the OS refuses to spawn the thread.
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        let abandoned = {
            let mut slot = self.slot.lock();
            if slot.state == WorkerState::Running {
                debug!("Callback worker already running");
                return Ok(());
            }
            slot.abandoned.take()
        };

        if let Some(abandoned) = abandoned {
            let wait_time = self.config.shutdown_wait_time();
            if !abandoned.exit.wait(wait_time) {
                self.slot.lock().abandoned = Some(abandoned);
                return Err(WorkerError::PreviousWorkerAlive(wait_time).into());
            }
            if abandoned.handle.join().is_err() {
                error!("Callback worker thread panicked");
            }
            debug!("Previous callback worker exited");
        }

        let mut slot = self.slot.lock();

        let stop_flag = Arc::new(AtomicBool::new(false));
        let exit = Arc::new(ExitSignal::default());
        let worker_loop = WorkerLoop {
            queue: self.queue.clone(),
            registry: self.registry.clone(),
            stop_flag: stop_flag.clone(),
            exit: exit.clone(),
            pop_timeout: self.config.record_update_timeout(),
            drain_time: self.config.shutdown_wait_time(),
            stats: self.stats.clone(),
        };

        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker_loop.run())
            .map_err(WorkerError::StartFailure)?;

        slot.state = WorkerState::Running;
        slot.stop_flag = Some(stop_flag);
        slot.exit = Some(exit);
        slot.handle = Some(handle);

        info!(
            pending = self.queue.size(),
            "Callback worker started"
        );
        Ok(())
    }

    /// Stops the worker thread, waiting at most `shutdown_wait_time`.
    ///
    /// The thread first dispatches the entries already queued, then exits.
    /// Calling `stop()` when the worker is not running is a no-op. If the
    /// thread does not exit in time it is left to finish on its own and a
    /// warning is logged; the next `start()` waits for it.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        let (stop_flag, exit, handle) = {
            let mut slot = self.slot.lock();
            if slot.state != WorkerState::Running {
                return;
            }
            slot.state = WorkerState::ShuttingDown;
            (slot.stop_flag.take(), slot.exit.take(), slot.handle.take())
        };

        if let Some(flag) = stop_flag {
            flag.store(true, Ordering::Release);
        }
        self.queue.wake_all();

        let wait_time = self.config.shutdown_wait_time();
        let mut abandoned = None;
        match (exit, handle) {
            (Some(exit), Some(handle)) if !exit.wait(wait_time) => {
                // The thread keeps its own stop flag and exits once its drain window closes.
                warn!("{}", WorkerError::ShutdownTimeout(wait_time));
                abandoned = Some(AbandonedWorker { exit, handle });
            }
            (_, handle) => {
                if let Some(handle) = handle {
                    if handle.join().is_err() {
                        error!("Callback worker thread panicked");
                    }
                }
                info!(
                    pending = self.queue.size(),
                    "Callback worker stopped"
                );
            }
        }

        let mut slot = self.slot.lock();
        slot.abandoned = abandoned;
        slot.state = WorkerState::NotRunning;
    }

    pub fn state(&self) -> WorkerState {
        self.slot.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot()
    }
}

impl<V: RecordValue> Drop for CallbackWorker<V> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if let Some(flag) = slot.stop_flag.take() {
            flag.store(true, Ordering::Release);
            self.queue.wake_all();
        }
        if let (Some(exit), Some(handle)) = (slot.exit.take(), slot.handle.take()) {
            if exit.wait(self.config.shutdown_wait_time()) {
                let _ = handle.join();
            } else {
                warn!("{}", WorkerError::ShutdownTimeout(self.config.shutdown_wait_time()));
            }
        }
        slot.state = WorkerState::NotRunning;
    }
}

struct WorkerLoop<V: RecordValue> {
    queue: Arc<SynchronizedQueue<ChannelName>>,
    registry: Arc<RecordRegistry<V>>,
    stop_flag: Arc<AtomicBool>,
    exit: Arc<ExitSignal>,
    pop_timeout: Duration,
    /// How long a stopping worker keeps draining queued entries
    drain_time: Duration,
    stats: Arc<StatsCounters>,
}

impl<V: RecordValue> WorkerLoop<V> {
    fn run(self) {
        let _exit = ExitGuard(self.exit.clone());
        debug!("Callback worker thread started");

        let mut drain_deadline: Option<Instant> = None;
        loop {
            // Read before the flag so a stop in between still interrupts the pop
            let epoch = self.queue.wakeup_epoch();
            let stopping = self.stop_flag.load(Ordering::Acquire);

            let next = if stopping {
                let deadline =
                    *drain_deadline.get_or_insert_with(|| Instant::now() + self.drain_time);
                if Instant::now() >= deadline {
                    break;
                }
                self.queue.try_pop()
            } else {
                self.queue.pop_since(epoch, self.pop_timeout).ok()
            };

            match next {
                Some(channel) => {
                    CALLBACK_QUEUE_DEPTH.set(self.queue.size() as i64);
                    self.dispatch(&channel);
                }
                None if stopping => break,
                None => {}
            }
        }

        debug!(
            left = self.queue.size(),
            "Callback worker thread stopped"
        );
    }

    fn dispatch(
        &self,
        channel: &str,
    ) {
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);

        // The record may have been removed after the write was queued.
        let Some(record) = self.registry.get(channel) else {
            self.count(&self.stats.missing, OUTCOME_MISSING);
            trace!(channel = %channel, "Record gone before dispatch");
            return;
        };
        let Some(callback) = record.on_write() else {
            self.count(&self.stats.no_callback, OUTCOME_NO_CALLBACK);
            return;
        };

        let value = record.value();
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(&value)));
        CALLBACK_LATENCY_MS.observe(started.elapsed().as_secs_f64() * 1000.0);

        let reason = match outcome {
            Ok(Ok(())) => {
                self.count(&self.stats.invoked, OUTCOME_INVOKED);
                trace!(channel = %channel, "Write callback invoked");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        self.count(&self.stats.failed, OUTCOME_FAILED);
        let e = WorkerError::CallbackFailed {
            channel: channel.to_string(),
            reason,
        };
        error!(channel = %channel, "{}", e);
    }

    fn count(
        &self,
        counter: &AtomicU64,
        outcome: &str,
    ) {
        counter.fetch_add(1, Ordering::Relaxed);
        CALLBACK_DISPATCH_TOTAL.with_label_values(&[outcome]).inc();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
