use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Server bind and advertisement configuration.
///
/// The wire protocol (REST/gRPC) is an external shell (§1); what the core
/// needs from "the server" is where it binds and, for the Response
/// Resumer, what address other instances should be told to redirect to
/// (§4.4.2). Both matter because the resumer's locator advertises a real,
/// externally-reachable host:port, not just the bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Explicit externally-reachable address to advertise in the Response
    /// Resumer's locator, e.g. `memoryd-3.internal:7443`. Takes priority
    /// over observed forwarded-host headers and local hostname detection
    /// (§4.4.2 priority order 1).
    #[serde(default)]
    pub advertised_address: Option<String>,

    /// Request timeout in seconds, for non-streaming operations.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            advertised_address: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.host, self.port)
    }

    pub fn is_loopback(&self) -> bool {
        self.host.is_loopback()
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    7443
}

fn default_timeout() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_all_interfaces() {
        let cfg = ServerConfig::default();
        assert!(!cfg.is_loopback());
        assert_eq!(cfg.port, 7443);
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let cfg = ServerConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(cfg.bind_addr().to_string(), "127.0.0.1:9000");
    }
}
