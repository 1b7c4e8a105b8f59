use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::RwLock;
use tracing::debug;
use tracing::info;

use super::ServingRuntime;
use crate::RecordHandle;
use crate::RecordValue;
use crate::Result;
use crate::RuntimeError;

/// In-process serving runtime.
///
/// Stands in for a network server: "clients" are threads calling
/// [`client_get`](Self::client_get) and [`client_put`](Self::client_put).
/// Writes are delivered exactly like a network runtime would deliver them, so
/// callbacks still run on the server's callback worker.
pub struct LocalServingRuntime<V> {
    channels: RwLock<HashMap<String, RecordHandle<V>>>,
    serving: AtomicBool,
}

impl<V: RecordValue> Default for LocalServingRuntime<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: RecordValue> LocalServingRuntime<V> {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            serving: AtomicBool::new(false),
        }
    }

    /// Remote read of `channel`
    pub fn client_get(
        &self,
        channel: &str,
    ) -> Result<V> {
        Ok(self.served_record(channel)?.value())
    }

    /// Remote write of `channel`; queues the record's write callback
    pub fn client_put(
        &self,
        channel: &str,
        value: V,
    ) -> Result<()> {
        let record = self.served_record(channel)?;
        record.apply_remote_write(value);
        debug!(channel = %channel, "Client write delivered");
        Ok(())
    }

    pub fn is_attached(
        &self,
        channel: &str,
    ) -> bool {
        self.channels.read().contains_key(channel)
    }

    pub fn attached_channels(&self) -> Vec<String> {
        self.channels.read().keys().cloned().collect()
    }

    fn served_record(
        &self,
        channel: &str,
    ) -> Result<RecordHandle<V>> {
        if !self.is_serving() {
            return Err(RuntimeError::NotServing.into());
        }
        self.channels
            .read()
            .get(channel)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownChannel(channel.to_string()).into())
    }
}

impl<V: RecordValue> ServingRuntime<V> for LocalServingRuntime<V> {
    fn attach(
        &self,
        channel: &str,
        record: RecordHandle<V>,
    ) -> Result<()> {
        let mut channels = self.channels.write();
        if channels.contains_key(channel) {
            return Err(RuntimeError::AttachFailed {
                channel: channel.to_string(),
                reason: "channel already attached".to_string(),
            }
            .into());
        }
        channels.insert(channel.to_string(), record);
        Ok(())
    }

    fn detach(
        &self,
        channel: &str,
    ) -> Result<()> {
        match self.channels.write().remove(channel) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::DetachFailed {
                channel: channel.to_string(),
                reason: "channel not attached".to_string(),
            }
            .into()),
        }
    }

    fn start_serving(&self) -> Result<()> {
        self.serving.store(true, Ordering::SeqCst);
        info!("Local serving runtime started");
        Ok(())
    }

    fn stop_serving(&self) -> Result<()> {
        self.serving.store(false, Ordering::SeqCst);
        info!("Local serving runtime stopped");
        Ok(())
    }

    fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }
}
