use thiserror::Error;

/// Failures standing up or running the HTTP server.
#[derive(Debug, Error)]
pub enum Error {
    /// The listen address could not be bound.
    #[error("failed to bind to the listen address: {0}")]
    Bind(std::io::Error),

    /// The server exited with an error.
    #[error("server error: {0}")]
    Server(std::io::Error),
}
