use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use pva_server::CallbackWorkerConfig;
use pva_server::LocalServingRuntime;
use pva_server::PvaServer;
use pva_server::ServerConfig;
use pva_server::WriteCallback;

pub const RECORD_UPDATE_TIMEOUT_IN_MS: u64 = 20;
pub const SHUTDOWN_WAIT_TIME_IN_MS: u64 = 300;

// generous upper bound for anything asynchronous to show up
pub const WAIT_FOR_DISPATCH: Duration = Duration::from_secs(3);

pub fn test_config() -> ServerConfig {
    ServerConfig {
        worker: CallbackWorkerConfig {
            record_update_timeout_ms: RECORD_UPDATE_TIMEOUT_IN_MS,
            shutdown_wait_time_ms: SHUTDOWN_WAIT_TIME_IN_MS,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn start_local_server() -> (Arc<LocalServingRuntime<i64>>, PvaServer<i64>) {
    let runtime = Arc::new(LocalServingRuntime::new());
    let server = PvaServer::with_config(runtime.clone(), test_config()).expect("valid config");
    (runtime, server)
}

/// Collects the values a write callback observed
#[derive(Clone, Default)]
pub struct Observed {
    values: Arc<Mutex<Vec<i64>>>,
}

impl Observed {
    pub fn callback(&self) -> WriteCallback<i64> {
        let values = self.values.clone();
        WriteCallback::infallible(move |v: &i64| values.lock().push(*v))
    }

    pub fn values(&self) -> Vec<i64> {
        self.values.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.values.lock().len()
    }

    pub fn wait_for(
        &self,
        expected: usize,
    ) -> bool {
        eventually(WAIT_FOR_DISPATCH, || self.count() >= expected)
    }
}

pub fn eventually(
    timeout: Duration,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
