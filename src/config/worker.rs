use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_WORKER_THREAD_NAME;
use crate::Error;
use crate::Result;

/// Timing for the deferred callback worker
///
/// ```toml
/// [worker]
/// record_update_timeout_ms = 100
/// shutdown_wait_time_ms = 1000
/// thread_name = "pva-callback-worker"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CallbackWorkerConfig {
    /// How long one queue wait blocks before the worker re-checks its stop flag
    #[serde(default = "default_record_update_timeout_ms")]
    pub record_update_timeout_ms: u64,

    /// Upper bound on how long `stop()` waits for the worker thread to exit
    #[serde(default = "default_shutdown_wait_time_ms")]
    pub shutdown_wait_time_ms: u64,

    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for CallbackWorkerConfig {
    fn default() -> Self {
        Self {
            record_update_timeout_ms: default_record_update_timeout_ms(),
            shutdown_wait_time_ms: default_shutdown_wait_time_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl CallbackWorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.record_update_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "worker.record_update_timeout_ms must be at least 1ms".into(),
            ));
        }

        if self.shutdown_wait_time_ms == 0 {
            return Err(Error::InvalidConfig(
                "worker.shutdown_wait_time_ms must be at least 1ms".into(),
            ));
        }

        if self.thread_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "worker.thread_name cannot be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn record_update_timeout(&self) -> Duration {
        Duration::from_millis(self.record_update_timeout_ms)
    }

    pub fn shutdown_wait_time(&self) -> Duration {
        Duration::from_millis(self.shutdown_wait_time_ms)
    }
}

// in ms
fn default_record_update_timeout_ms() -> u64 {
    100
}
// in ms
fn default_shutdown_wait_time_ms() -> u64 {
    1000
}
fn default_thread_name() -> String {
    DEFAULT_WORKER_THREAD_NAME.to_string()
}
