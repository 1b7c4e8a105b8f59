use std::net::IpAddr;
use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Prometheus exposure of the callback and registry metrics
///
/// ```toml
/// [monitoring]
/// prometheus_enabled = true
/// prometheus_bind_address = "127.0.0.1"
/// prometheus_port = 9090
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_enabled: bool,

    #[serde(default = "default_prometheus_bind_address")]
    pub prometheus_bind_address: String,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            prometheus_bind_address: default_prometheus_bind_address(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

impl MonitoringConfig {
    /// # Errors
    /// `Error::InvalidConfig` when metrics are enabled with port 0, with a
    /// privileged port or with a bind address that is not an IP address.
    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            if self.prometheus_port != default_prometheus_port() {
                warn!(
                    "prometheus_port configured to {} but monitoring is disabled",
                    self.prometheus_port
                );
            }
            return Ok(());
        }

        match self.prometheus_port {
            0 => Err(Error::InvalidConfig(
                "monitoring.prometheus_port cannot be 0 when enabled".into(),
            )),
            p if p < 1024 => Err(Error::InvalidConfig(format!(
                "monitoring.prometheus_port {p} is a privileged port"
            ))),
            _ => self.metrics_addr().map(|_| ()),
        }
    }

    /// Socket address the metrics endpoint binds to.
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.prometheus_bind_address.parse().map_err(|_| {
            Error::InvalidConfig(format!(
                "monitoring.prometheus_bind_address {:?} is not an IP address",
                self.prometheus_bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.prometheus_port))
    }
}

fn default_prometheus_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_prometheus_port() -> u16 {
    9090
}
