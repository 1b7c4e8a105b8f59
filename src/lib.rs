//! # pva-server
//!
//! In-process record server: publishes named records through a pluggable
//! serving runtime and runs user write callbacks on a dedicated worker thread.
//!
//! ## Moving parts
//!
//! - [`PvaServer`] - orchestrator; add/remove/update records, start/stop
//! - [`RecordRegistry`] - channel name to record map, kept in lockstep with the runtime
//! - [`CallbackWorker`] - drains the callback queue and invokes [`WriteCallback`]s
//! - [`SynchronizedQueue`](queue::SynchronizedQueue) - blocking FIFO between writers and the worker
//! - [`ServingRuntime`] - seam to the network layer; [`LocalServingRuntime`] serves in-process
//! - [`DefinitionLoader`] - declarative initialization, see [`TomlDefinitionLoader`]
//!
//! ## Quick start
//!
//! ```ignore
//! let runtime = Arc::new(LocalServingRuntime::<i64>::new());
//! let server = PvaServer::new(runtime.clone());
//! server.add_record(
//!     "counter",
//!     0,
//!     Some(WriteCallback::infallible(|v: &i64| println!("counter = {v}"))),
//! )?;
//! server.start()?;
//!
//! runtime.client_put("counter", 1)?; // callback runs on the worker thread
//! server.stop();
//! ```

mod config;
mod constants;
mod definitions;
mod errors;
mod metrics;
pub mod queue;
mod record;
mod registry;
mod runtime;
mod server;
mod worker;

pub use config::*;
pub use definitions::*;
pub use errors::*;
pub use metrics::*;
pub use record::*;
pub use registry::*;
pub use runtime::*;
pub use server::*;
pub use worker::*;


#[cfg(test)]
pub(crate) mod test_utils;
