//! Binds the listen socket and serves the relay's HTTP surface.

mod error;

use std::net::SocketAddr;

use config::Config;
use tokio::net::TcpListener;

pub(crate) type Result<T> = std::result::Result<T, error::Error>;

/// Everything [`serve`] needs to get going.
pub struct ServeConfig {
    /// The resolved address to listen on.
    pub listen_address: SocketAddr,
    /// The loaded application configuration.
    pub config: Config,
}

/// Serve the relay until the process is stopped.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> crate::Result<()> {
    let app = llm::router(&config);

    let listener = TcpListener::bind(listen_address).await.map_err(error::Error::Bind)?;

    log::info!("Messages endpoint available at: http://{listen_address}/v1/messages");

    axum::serve(listener, app).await.map_err(error::Error::Server)?;

    Ok(())
}
