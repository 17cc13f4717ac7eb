use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockServerError {
    #[error("Failed to bind to address {addr}: {source}")]
    BindError {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server task panicked")]
    ServerPanic(#[from] tokio::task::JoinError),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Timed out after {timeout:?} waiting for {expected} {signal} (found {found})")]
    Timeout {
        signal: &'static str,
        expected: usize,
        found: usize,
        timeout: Duration,
    },
}
