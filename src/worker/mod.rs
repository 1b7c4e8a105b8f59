//! Deferred write-callback dispatch.
//!
//! A single background thread drains the callback queue. For each channel name
//! it looks the record up again and runs its write callback against the
//! record's current value. Serving threads only ever push to the queue, so a
//! slow or failing callback never stalls a client write.
//!
//! ```text
//! client write ──> RecordHandle::apply_remote_write ──> SynchronizedQueue
//!                                                             │ pop(record_update_timeout)
//!                                                             ▼
//!                                   CallbackWorker thread ──> RecordRegistry::get
//!                                                             │
//!                                                             ▼
//!                                                   WriteCallback::invoke
//! ```
//!
//! # Lifecycle
//!
//! `NotRunning -> Running -> ShuttingDown -> NotRunning`. On `stop()` the
//! thread dispatches what is already queued and exits; the caller waits at
//! most `shutdown_wait_time`. A worker stuck in a callback is abandoned with a
//! warning, and the next `start()` refuses to run alongside it.

mod callback_worker;


pub use callback_worker::*;
