// -
// Configuration

/// Environment variable naming an extra configuration file
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
/// Prefix of configuration environment variables, e.g. `PVA__WORKER__THREAD_NAME`
pub(crate) const CONFIG_ENV_PREFIX: &str = "PVA";

// -
// Callback worker

pub(crate) const DEFAULT_WORKER_THREAD_NAME: &str = "pva-callback-worker";

// -
// Metrics labels

pub(crate) const OUTCOME_INVOKED: &str = "invoked";
pub(crate) const OUTCOME_MISSING: &str = "missing";
pub(crate) const OUTCOME_NO_CALLBACK: &str = "no_callback";
pub(crate) const OUTCOME_FAILED: &str = "failed";
