use std::fmt::Debug;
use std::sync::Arc;

/// Result of a user write callback
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// User logic run on the callback worker after a remote client wrote a record.
///
/// The callback receives a snapshot of the record's value taken at dispatch
/// time, not the value carried by the write that triggered it. Two quick
/// writes may therefore produce two invocations that observe the same value.
pub struct WriteCallback<V> {
    f: Arc<dyn Fn(&V) -> CallbackResult + Send + Sync>,
}

impl<V> Clone for WriteCallback<V> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<V> Debug for WriteCallback<V> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WriteCallback").finish_non_exhaustive()
    }
}

impl<V> WriteCallback<V> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&V) -> CallbackResult + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Wraps a callback that cannot fail.
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        Self::new(move |value| {
            f(value);
            Ok(())
        })
    }

    pub fn invoke(
        &self,
        value: &V,
    ) -> CallbackResult {
        (self.f)(value)
    }

    /// True when both wrap the same closure instance
    pub fn ptr_eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}
