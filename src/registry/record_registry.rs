use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::metrics::PUBLISHED_RECORDS;
use crate::ChannelName;
use crate::RecordHandle;
use crate::RecordValue;
use crate::RegistryError;
use crate::Result;
use crate::ServingRuntime;

/// Concurrent map from channel name to record, kept in lockstep with the
/// serving runtime's attachments.
pub struct RecordRegistry<V: RecordValue> {
    records: RwLock<HashMap<ChannelName, RecordHandle<V>>>,
    runtime: Arc<dyn ServingRuntime<V>>,
}

impl<V: RecordValue> Debug for RecordRegistry<V> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RecordRegistry")
            .field("records", &self.records.read().len())
            .finish_non_exhaustive()
    }
}

impl<V: RecordValue> RecordRegistry<V> {
    pub fn new(runtime: Arc<dyn ServingRuntime<V>>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            runtime,
        }
    }

    /// Registers `record` under its channel name and attaches it.
    ///
    /// # Errors
    /// - `RegistryError::InvalidChannelName` for an empty name
    /// - `RegistryError::AlreadyExists` if the name is taken; the existing
    ///   record is left untouched
    /// - any attach error from the serving runtime; nothing is inserted
    pub fn add(
        &self,
        record: RecordHandle<V>,
    ) -> Result<()> {
        let channel = record.channel().to_string();
        if channel.is_empty() {
            return Err(RegistryError::InvalidChannelName(channel).into());
        }

        let mut records = self.records.write();
        if records.contains_key(&channel) {
            return Err(RegistryError::AlreadyExists { channel }.into());
        }

        self.runtime.attach(&channel, record.clone())?;
        records.insert(channel.clone(), record);
        PUBLISHED_RECORDS.inc();

        debug!(channel = %channel, "Record attached");
        Ok(())
    }

    /// Detaches and unregisters `channel`, returning its handle.
    ///
    /// If the runtime refuses the detach, the record stays registered.
    pub fn remove(
        &self,
        channel: &str,
    ) -> Result<RecordHandle<V>> {
        let mut records = self.records.write();
        if !records.contains_key(channel) {
            return Err(not_found(channel));
        }

        self.runtime.detach(channel)?;
        let record = records.remove(channel).ok_or_else(|| not_found(channel))?;
        PUBLISHED_RECORDS.dec();

        debug!(channel = %channel, "Record detached");
        Ok(record)
    }

    /// Detaches and unregisters every record. Detach failures are logged and
    /// the record is dropped from the registry regardless.
    ///
    /// Returns the number of records removed.
    pub fn remove_all(&self) -> usize {
        let mut records = self.records.write();
        let removed = records.len();

        for channel in records.keys() {
            if let Err(e) = self.runtime.detach(channel) {
                warn!(channel = %channel, "Detach failed during teardown: {:?}", e);
            }
        }
        records.clear();
        PUBLISHED_RECORDS.sub(removed as i64);

        if removed > 0 {
            info!("Removed all {} records", removed);
        }
        removed
    }

    /// Looks up `channel`.
    pub fn find(
        &self,
        channel: &str,
    ) -> Result<RecordHandle<V>> {
        self.get(channel).ok_or_else(|| not_found(channel))
    }

    /// Lookup without an error for the miss case.
    pub fn get(
        &self,
        channel: &str,
    ) -> Option<RecordHandle<V>> {
        self.records.read().get(channel).cloned()
    }

    /// The only registered record.
    ///
    /// # Errors
    /// - `RegistryError::NotFound` when the registry is empty
    /// - `RegistryError::InvalidState` when more than one record is registered
    pub fn single(&self) -> Result<RecordHandle<V>> {
        let records = self.records.read();
        let mut iter = records.values();
        match (iter.next(), iter.next()) {
            (Some(record), None) => Ok(record.clone()),
            (None, _) => Err(RegistryError::NotFound {
                channel: String::new(),
            }
            .into()),
            (Some(_), Some(_)) => Err(RegistryError::InvalidState(format!(
                "cannot address a single record: {} records are published",
                records.len()
            ))
            .into()),
        }
    }

    pub fn has(
        &self,
        channel: &str,
    ) -> bool {
        self.records.read().contains_key(channel)
    }

    /// Snapshot of the registered channel names, in no particular order.
    pub fn names(&self) -> Vec<ChannelName> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: RecordValue> Drop for RecordRegistry<V> {
    fn drop(&mut self) {
        PUBLISHED_RECORDS.sub(self.records.get_mut().len() as i64);
    }
}

fn not_found(channel: &str) -> crate::Error {
    RegistryError::NotFound {
        channel: channel.to_string(),
    }
    .into()
}
