use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::AccessAttrs;
use super::ChannelName;
use super::RecordValue;
use super::WriteCallback;
use crate::metrics::CALLBACK_QUEUE_DEPTH;
use crate::queue::SynchronizedQueue;

/// Enqueues channel names for deferred callback dispatch.
///
/// Every record published by one server shares that server's queue.
#[derive(Clone)]
pub struct WriteNotifier {
    queue: Arc<SynchronizedQueue<ChannelName>>,
}

impl WriteNotifier {
    pub(crate) fn new(queue: Arc<SynchronizedQueue<ChannelName>>) -> Self {
        Self { queue }
    }

    pub fn notify(
        &self,
        channel: &str,
    ) {
        self.queue.push(channel.to_string());
        CALLBACK_QUEUE_DEPTH.set(self.queue.size() as i64);
        trace!(channel = %channel, "Write queued for callback dispatch");
    }
}

struct RecordInner<V> {
    channel: ChannelName,
    value: RwLock<V>,
    on_write: Option<WriteCallback<V>>,
    access: Option<AccessAttrs>,
    notifier: WriteNotifier,
}

/// Shared handle to a published record.
///
/// Value reads and writes are serialized by the handle itself and are safe
/// from any thread.
pub struct RecordHandle<V> {
    inner: Arc<RecordInner<V>>,
}

impl<V> Clone for RecordHandle<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Debug for RecordHandle<V> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RecordHandle")
            .field("channel", &self.inner.channel)
            .field("has_callback", &self.inner.on_write.is_some())
            .field("access", &self.inner.access)
            .finish()
    }
}

impl<V: RecordValue> RecordHandle<V> {
    pub(crate) fn new(
        channel: ChannelName,
        value: V,
        on_write: Option<WriteCallback<V>>,
        access: Option<AccessAttrs>,
        notifier: WriteNotifier,
    ) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                channel,
                value: RwLock::new(value),
                on_write,
                access,
                notifier,
            }),
        }
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    /// Snapshot of the current value
    pub fn value(&self) -> V {
        self.inner.value.read().clone()
    }

    /// Local write. Does not trigger the write callback.
    pub fn set_value(
        &self,
        value: V,
    ) {
        *self.inner.value.write() = value;
    }

    /// Local in-place modification. Does not trigger the write callback.
    pub fn modify<R>(
        &self,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let mut guard = self.inner.value.write();
        f(&mut guard)
    }

    /// Entry point for the serving runtime when a remote client writes.
    ///
    /// Stores the value and queues the channel for callback dispatch; the
    /// callback itself never runs on the calling thread.
    pub fn apply_remote_write(
        &self,
        value: V,
    ) {
        self.set_value(value);
        self.notify_remote_write();
    }

    /// Queues the channel for callback dispatch without touching the value,
    /// for runtimes that store remote writes themselves.
    pub fn notify_remote_write(&self) {
        self.inner.notifier.notify(&self.inner.channel);
    }

    pub fn on_write(&self) -> Option<&WriteCallback<V>> {
        self.inner.on_write.as_ref()
    }

    pub fn has_callback(&self) -> bool {
        self.inner.on_write.is_some()
    }

    pub fn access_attrs(&self) -> Option<&AccessAttrs> {
        self.inner.access.as_ref()
    }

    /// True when both handles refer to the same published record
    pub fn ptr_eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
