use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// A reverse proxy translating Anthropic Messages traffic to an
/// OpenAI-compatible Chat Completions upstream.
#[derive(Debug, Parser)]
#[command(name = "relay", version)]
pub struct Args {
    /// Path to the TOML configuration file. When omitted, built-in defaults
    /// apply.
    #[arg(short, long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file.
    #[arg(short, long)]
    pub listen_address: Option<SocketAddr>,

    /// Log filter, e.g. "info" or "llm=debug".
    #[arg(long, default_value = "info")]
    pub log: String,
}
