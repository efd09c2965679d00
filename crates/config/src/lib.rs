//! Relay configuration structures to map the relay.toml configuration.

#![deny(missing_docs)]

mod loader;
mod server;
mod upstream;

use std::path::Path;

use serde::Deserialize;
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;

/// Main configuration structure for the relay application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// Upstream Chat Completions endpoint settings.
    pub upstream: UpstreamConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }
}
