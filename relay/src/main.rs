use args::Args;
use clap::Parser;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args.log);

    let mut config = match &args.config {
        Some(path) => config::Config::load(path)?,
        None => config::Config::default(),
    };

    // A bare environment variable stands in for an absent configuration
    // entry, so the relay runs without a config file at all.
    if config.upstream.api_key.is_none()
        && let Ok(key) = std::env::var("COPILOT_API_KEY")
    {
        config.upstream.api_key = Some(key.into());
    }

    let listen_address = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or_else(config::ServerConfig::default_listen_address);

    log::info!("Claude proxy listening on {listen_address}");

    server::serve(server::ServeConfig { listen_address, config }).await?;

    Ok(())
}
