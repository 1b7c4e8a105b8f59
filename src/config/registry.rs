use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Detach and forget every record when the server stops.
    ///
    /// Set it to false to keep records registered across a stop/start cycle;
    /// they are served again on the next `start()`. Dropping the server
    /// always tears the registry down.
    #[serde(default = "default_detach_records_on_stop")]
    pub detach_records_on_stop: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            detach_records_on_stop: default_detach_records_on_stop(),
        }
    }
}

fn default_detach_records_on_stop() -> bool {
    true
}
