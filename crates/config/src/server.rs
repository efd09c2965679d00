use std::net::{Ipv4Addr, SocketAddr};

use serde::Deserialize;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The address the relay listens on. Defaults to `0.0.0.0:8082`.
    pub listen_address: Option<SocketAddr>,
}

impl ServerConfig {
    /// The listen address used when neither the configuration file nor the
    /// command line names one.
    pub fn default_listen_address() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8082))
    }
}
