mod parser;

pub use parser::{Ingest, MetricLine};

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::error::MockServerError;
use crate::store::CaptureStore;

/// Receive buffer size. Longer datagrams are truncated by the socket.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

pub(crate) async fn bind(addr: SocketAddr) -> Result<UdpSocket, MockServerError> {
    UdpSocket::bind(addr)
        .await
        .map_err(|source| MockServerError::BindError { addr, source })
}

/// Receives DogStatsD datagrams until `shutdown` fires.
///
/// Nothing is ever sent back to the sender. Receive errors are logged and the
/// loop keeps going.
pub(crate) async fn serve(
    socket: UdpSocket,
    store: CaptureStore,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), MockServerError> {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::debug!("statsd listener stopping");
                return Ok(());
            }

            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error = %e, "Error receiving metric datagram");
                        continue;
                    }
                };
                handle_datagram(&store, &buf[..len], peer).await;
            }
        }
    }
}

async fn handle_datagram(store: &CaptureStore, bytes: &[u8], peer: SocketAddr) {
    let ingest = Ingest::from_datagram(bytes);

    match &ingest {
        Ingest::Parsed { line, .. } => {
            tracing::info!(
                name = %line.name,
                value = %line.value,
                metric_type = %line.metric_type,
                tags = line.tags.as_deref().unwrap_or(""),
                source = %peer.ip(),
                "Metric received"
            );
        }
        Ingest::RawOnly { raw } => {
            tracing::info!(raw_line = %raw, source = %peer.ip(), "Unstructured metric received");
        }
        Ingest::Rejected { error } => {
            tracing::warn!(%error, source = %peer.ip(), "Dropping non-UTF-8 metric datagram");
        }
    }

    if let Some(metric) = ingest.into_metric(peer.ip()) {
        store.append_metric(metric).await;
    }
}
