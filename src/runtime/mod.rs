//! Serving runtime seam.
//!
//! The runtime owns the network side: it accepts client connections, serves
//! reads of attached records and delivers client writes through
//! [`RecordHandle::apply_remote_write`](crate::RecordHandle::apply_remote_write).
//! The server only attaches and detaches records and starts or stops serving.

mod local;


pub use local::*;

#[cfg(test)]
use mockall::automock;

use crate::RecordHandle;
use crate::RecordValue;
use crate::Result;

#[cfg_attr(test, automock)]
pub trait ServingRuntime<V: RecordValue>: Send + Sync + 'static {
    /// Makes `record` reachable by remote clients under `channel`.
    ///
    /// Called while the registry lock is held; must not call back into the
    /// server.
    fn attach(
        &self,
        channel: &str,
        record: RecordHandle<V>,
    ) -> Result<()>;

    /// Stops serving `channel`. Called while the registry lock is held.
    fn detach(
        &self,
        channel: &str,
    ) -> Result<()>;

    fn start_serving(&self) -> Result<()>;

    fn stop_serving(&self) -> Result<()>;

    fn is_serving(&self) -> bool;
}
