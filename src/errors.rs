//! Record Server Error Hierarchy
//!
//! Errors are grouped by the subsystem that raises them. Registry and runtime
//! errors are returned synchronously to administrative callers; worker
//! callback failures never leave the worker thread and only appear in logs.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel registry violations (duplicate or missing channels)
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Callback worker lifecycle failures
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Serving runtime attach/detach failures
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Declarative record definition failures
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Metric registration or encoding failures
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Channel {channel} already exists")]
    AlreadyExists { channel: String },

    #[error("Channel {channel} not found")]
    NotFound { channel: String },

    #[error("Invalid channel name: {0:?}")]
    InvalidChannelName(String),

    /// The request cannot be served in the current registry state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker thread could not be spawned
    #[error("Failed to start callback worker: {0}")]
    StartFailure(#[source] std::io::Error),

    /// A user callback returned an error or panicked
    #[error("Callback for channel {channel} failed: {reason}")]
    CallbackFailed { channel: String, reason: String },

    /// The worker did not exit within the shutdown wait time
    #[error("Callback worker did not exit within {0:?}")]
    ShutdownTimeout(Duration),

    /// A worker abandoned by an earlier stop is still inside a callback
    #[error("Previous callback worker still running after {0:?}")]
    PreviousWorkerAlive(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to attach channel {channel}: {reason}")]
    AttachFailed { channel: String, reason: String },

    #[error("Failed to detach channel {channel}: {reason}")]
    DetachFailed { channel: String, reason: String },

    #[error("Serving runtime is not serving")]
    NotServing,

    #[error("Channel {0} is not attached to the serving runtime")]
    UnknownChannel(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Failed to read definition file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse record definitions: {0}")]
    Parse(#[source] ConfigError),

    #[error("Unresolved macro $({name}) in record definitions")]
    UnresolvedMacro { name: String },

    #[error("Malformed substitution entry: {0:?}")]
    MalformedSubstitution(String),

    #[error("Channel {0} is defined more than once")]
    DuplicateChannel(String),

    #[error("Record {channel}: access_level and access_group must be given together")]
    IncompleteAccessAttrs { channel: String },
}

impl Error {
    /// Returns true for the `AlreadyExists` registry error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::Registry(RegistryError::AlreadyExists { .. }))
    }

    /// Returns true for the `NotFound` registry error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Registry(RegistryError::NotFound { .. }))
    }
}
