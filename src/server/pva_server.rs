use std::fmt::Debug;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::queue::SynchronizedQueue;
use crate::AccessAttrs;
use crate::CallbackWorker;
use crate::ChannelName;
use crate::DefinitionLoader;
use crate::RecordHandle;
use crate::RecordRegistry;
use crate::RecordValue;
use crate::RegistryError;
use crate::Result;
use crate::ServerConfig;
use crate::ServingRuntime;
use crate::Substitutions;
use crate::TomlDefinitionLoader;
use crate::WorkerState;
use crate::WorkerStats;
use crate::WriteCallback;
use crate::WriteNotifier;

/// Publishes records through a serving runtime and runs their write
/// callbacks on a dedicated worker thread.
///
/// All methods take `&self` and may be called from any thread, including the
/// runtime's serving threads. Remote writes only enqueue the channel name; the
/// callback runs later on the worker against the record's value at that time.
///
/// Dropping the server stops it and detaches every record.
pub struct PvaServer<V: RecordValue> {
    config: ServerConfig,
    runtime: Arc<dyn ServingRuntime<V>>,
    queue: Arc<SynchronizedQueue<ChannelName>>,
    notifier: WriteNotifier,
    registry: Arc<RecordRegistry<V>>,
    worker: CallbackWorker<V>,
    /// Couples runtime and worker transitions
    lifecycle: Mutex<()>,
    running: AtomicBool,
    definitions_active: AtomicBool,
}

impl<V: RecordValue> Debug for PvaServer<V> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PvaServer")
            .field("running", &self.is_running())
            .field("registry", &self.registry)
            .field("pending_callbacks", &self.pending_callbacks())
            .finish_non_exhaustive()
    }
}

impl<V: RecordValue> PvaServer<V> {
    /// Creates a stopped server with the default configuration.
    pub fn new(runtime: Arc<dyn ServingRuntime<V>>) -> Self {
        Self::build(runtime, ServerConfig::default())
    }

    /// Creates a stopped server after validating `config`.
    pub fn with_config(
        runtime: Arc<dyn ServingRuntime<V>>,
        config: ServerConfig,
    ) -> Result<Self> {
        Ok(Self::build(runtime, config.validate()?))
    }

    /// Creates a server publishing one record and starts it.
    pub fn with_record(
        runtime: Arc<dyn ServingRuntime<V>>,
        channel: &str,
        value: V,
    ) -> Result<Self> {
        let server = Self::new(runtime);
        server.add_record(channel, value, None)?;
        server.start()?;
        Ok(server)
    }

    /// Like [`with_record`](Self::with_record) with a write callback.
    pub fn with_record_and_callback(
        runtime: Arc<dyn ServingRuntime<V>>,
        channel: &str,
        value: V,
        on_write: WriteCallback<V>,
    ) -> Result<Self> {
        let server = Self::new(runtime);
        server.add_record(channel, value, Some(on_write))?;
        server.start()?;
        Ok(server)
    }

    fn build(
        runtime: Arc<dyn ServingRuntime<V>>,
        config: ServerConfig,
    ) -> Self {
        let queue = Arc::new(SynchronizedQueue::new());
        let registry = Arc::new(RecordRegistry::new(runtime.clone()));
        let worker = CallbackWorker::new(queue.clone(), registry.clone(), config.worker.clone());

        Self {
            notifier: WriteNotifier::new(queue.clone()),
            config,
            runtime,
            queue,
            registry,
            worker,
            lifecycle: Mutex::new(()),
            running: AtomicBool::new(false),
            definitions_active: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // -
    // Records

    /// Publishes a new record under `channel`.
    ///
    /// # Errors
    /// - `RegistryError::AlreadyExists` if `channel` is taken; the existing
    ///   record keeps its value and callback
    /// - `RegistryError::InvalidChannelName` for an empty name
    /// - attach errors from the serving runtime
    pub fn add_record(
        &self,
        channel: &str,
        value: V,
        on_write: Option<WriteCallback<V>>,
    ) -> Result<()> {
        self.publish(channel, value, on_write, None)
    }

    /// Publishes a new record carrying access-security attributes. The
    /// attributes are forwarded to the serving runtime untouched.
    pub fn add_record_with_access_attrs(
        &self,
        channel: &str,
        value: V,
        access_level: i32,
        access_group: &str,
        on_write: Option<WriteCallback<V>>,
    ) -> Result<()> {
        self.publish(
            channel,
            value,
            on_write,
            Some(AccessAttrs::new(access_level, access_group)),
        )
    }

    fn publish(
        &self,
        channel: &str,
        value: V,
        on_write: Option<WriteCallback<V>>,
        access: Option<AccessAttrs>,
    ) -> Result<()> {
        let record = RecordHandle::new(
            channel.to_string(),
            value,
            on_write,
            access,
            self.notifier.clone(),
        );
        self.registry.add(record)?;
        info!(channel = %channel, "Record published");
        Ok(())
    }

    /// Detaches and forgets `channel`. Writes to it still waiting in the
    /// callback queue are dropped silently at dispatch.
    pub fn remove_record(
        &self,
        channel: &str,
    ) -> Result<()> {
        self.registry.remove(channel)?;
        info!(channel = %channel, "Record removed");
        Ok(())
    }

    /// Removes every record. Returns how many were removed.
    pub fn remove_all_records(&self) -> usize {
        self.registry.remove_all()
    }

    pub fn has_record(
        &self,
        channel: &str,
    ) -> bool {
        self.registry.has(channel)
    }

    /// Published channel names, in unspecified order.
    pub fn record_names(&self) -> Vec<ChannelName> {
        self.registry.names()
    }

    pub fn record(
        &self,
        channel: &str,
    ) -> Result<RecordHandle<V>> {
        self.registry.find(channel)
    }

    /// Sets the value of the only published record.
    ///
    /// Local updates do not run the write callback.
    ///
    /// # Errors
    /// - `RegistryError::NotFound` when no record is published
    /// - `RegistryError::InvalidState` when more than one record is published
    pub fn update_record(
        &self,
        value: V,
    ) -> Result<()> {
        self.registry.single()?.set_value(value);
        Ok(())
    }

    /// Sets the value of `channel`. Local updates do not run the write
    /// callback.
    pub fn update_record_named(
        &self,
        channel: &str,
        value: V,
    ) -> Result<()> {
        self.registry.find(channel)?.set_value(value);
        debug!(channel = %channel, "Record updated");
        Ok(())
    }

    /// Queues the write callback of `channel` as if a remote client had just
    /// written it.
    pub fn notify_write(
        &self,
        channel: &str,
    ) -> Result<()> {
        if !self.registry.has(channel) {
            return Err(RegistryError::NotFound {
                channel: channel.to_string(),
            }
            .into());
        }
        self.notifier.notify(channel);
        Ok(())
    }

    // -
    // Lifecycle

    /// Starts serving and then starts the callback worker.
    ///
    /// Calling `start()` on a running server is a no-op.
    ///
    /// # Errors
    /// Errors from the serving runtime, or a worker error
    /// (`WorkerError::StartFailure`, or `WorkerError::PreviousWorkerAlive` when
    /// a callback from before the last `stop()` is still running). On a worker
    /// error the runtime is stopped again.
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        if self.running.load(Ordering::Acquire) {
            debug!("Server already running");
            return Ok(());
        }

        self.runtime.start_serving()?;
        if let Err(e) = self.worker.start() {
            error!("Callback worker failed to start: {:?}", e);
            if let Err(stop_err) = self.runtime.stop_serving() {
                warn!("Serving runtime did not stop cleanly: {:?}", stop_err);
            }
            return Err(e);
        }

        self.running.store(true, Ordering::Release);
        info!(records = self.registry.len(), "Server started");
        Ok(())
    }

    /// Stops the callback worker and then stops serving.
    ///
    /// Writes queued before the call are dispatched first. Unless
    /// `registry.detach_records_on_stop` is turned off, every record is then
    /// detached and forgotten. Bounded by `worker.shutdown_wait_time_ms` plus
    /// the runtime's own stop time. Calling `stop()` on a stopped server is a
    /// no-op.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        self.worker.stop();
        if let Err(e) = self.runtime.stop_serving() {
            warn!("Serving runtime did not stop cleanly: {:?}", e);
        }
        if self.config.registry.detach_records_on_stop {
            self.registry.remove_all();
        }

        self.running.store(false, Ordering::Release);
        info!("Server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    pub fn worker_stats(&self) -> WorkerStats {
        self.worker.stats()
    }

    /// Writes queued for callback dispatch
    pub fn pending_callbacks(&self) -> usize {
        self.queue.size()
    }

    // -
    // Declarative initialization

    /// Publishes the records defined in the TOML file at `path`.
    ///
    /// `substitutions` uses the `KEY=VALUE,KEY2=VALUE2` format and feeds the
    /// `$(KEY)` / `${KEY}` macros of the file. Returns the number of records
    /// published.
    pub fn initialize_from_file(
        &self,
        path: impl AsRef<Path>,
        substitutions: Option<&str>,
    ) -> Result<usize>
    where
        V: DeserializeOwned,
    {
        let subs = match substitutions {
            Some(s) => Substitutions::parse(s)?,
            None => Substitutions::new(),
        };
        self.initialize_with(&TomlDefinitionLoader, path.as_ref(), &subs)
    }

    /// Publishes every record `loader` yields for `path`.
    ///
    /// All or nothing: if any record cannot be published, the records
    /// published by this call are removed again before the error is returned.
    pub fn initialize_with(
        &self,
        loader: &dyn DefinitionLoader<V>,
        path: &Path,
        substitutions: &Substitutions,
    ) -> Result<usize> {
        let definitions = loader.load(path, substitutions)?;

        let mut published: Vec<ChannelName> = Vec::with_capacity(definitions.len());
        for def in definitions {
            let name = def.name.clone();
            if let Err(e) = self.publish(&def.name, def.value, None, def.access) {
                warn!(
                    channel = %name,
                    "Rolling back {} records from {}: {:?}",
                    published.len(),
                    path.display(),
                    e
                );
                for channel in published.iter().rev() {
                    if let Err(rollback_err) = self.registry.remove(channel) {
                        error!(channel = %channel, "Rollback failed: {:?}", rollback_err);
                    }
                }
                return Err(e);
            }
            published.push(name);
        }

        self.definitions_active.store(true, Ordering::Release);
        info!(
            path = %path.display(),
            "Initialized {} records from definitions",
            published.len()
        );
        Ok(published.len())
    }

    /// True once records were published from a definition source.
    pub fn is_definitions_active(&self) -> bool {
        self.definitions_active.load(Ordering::Acquire)
    }
}

impl<V: RecordValue> Drop for PvaServer<V> {
    fn drop(&mut self) {
        self.stop();
        self.registry.remove_all();
    }
}
