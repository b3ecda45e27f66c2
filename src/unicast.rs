//! Component B: the ephemeral unicast listener a client opens to receive a
//! master's response, and the transient unicast sender a daemon opens to
//! deliver that response.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::config::MTU;
use crate::error::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct UnicastListener {
    socket: UdpSocket,
    closed: Arc<AtomicBool>,
}

impl UnicastListener {
    /// Binds a UDP socket on an OS-assigned ephemeral port.
    pub async fn new() -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        Ok(UnicastListener {
            socket,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    pub async fn read(&self, timeout: Option<Duration>) -> Option<(Vec<u8>, SocketAddr)> {
        read_with_timeout(&self.socket, &self.closed, timeout).await
    }

    /// Sends `bytes` to `addr`, splitting payloads over [`MTU`] bytes into
    /// back-to-back datagrams with no reassembly on read. Protocol
    /// payloads stay well under one MTU, so this only matters for
    /// pathological inputs.
    pub async fn send(&self, addr: SocketAddr, bytes: &[u8]) -> bool {
        send_chunked(&self.socket, addr, bytes).await
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A transient unicast sender bound to one peer, used by a daemon's
/// request handler to answer exactly one client (mirrors the Python
/// `udpClient`, which exists only to send one response datagram).
pub struct UnicastClient {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UnicastClient {
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect(peer).await?;
        Ok(UnicastClient { socket, peer })
    }

    pub async fn send(&self, bytes: &[u8]) -> bool {
        send_chunked(&self.socket, self.peer, bytes).await
    }
}

async fn send_chunked(socket: &UdpSocket, addr: SocketAddr, bytes: &[u8]) -> bool {
    for chunk in bytes.chunks(MTU) {
        match socket.send_to(chunk, addr).await {
            Ok(n) => log::trace!("unicast sent {n} bytes to {addr}"),
            Err(err) => {
                log::warn!("unicast send to {addr} failed: {err}");
                return false;
            }
        }
    }
    true
}

async fn read_with_timeout(
    socket: &UdpSocket,
    closed: &AtomicBool,
    timeout: Option<Duration>,
) -> Option<(Vec<u8>, SocketAddr)> {
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    let mut buf = [0u8; MTU];

    loop {
        if closed.load(Ordering::SeqCst) {
            return None;
        }

        let slice = match deadline {
            Some(d) => POLL_INTERVAL.min(d.saturating_duration_since(tokio::time::Instant::now())),
            None => POLL_INTERVAL,
        };

        match tokio::time::timeout(slice, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, src))) => {
                log::trace!("unicast received {n} bytes from {src}");
                return Some((buf[..n].to_vec(), src));
            }
            Ok(Err(err)) => {
                log::warn!("unicast read error: {err}");
                return None;
            }
            Err(_elapsed) => {
                if let Some(d) = deadline {
                    if tokio::time::Instant::now() >= d {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_receives_from_client() {
        let listener = UnicastListener::new().await.unwrap();
        let port = listener.port();
        assert!(port > 0);

        let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port);
        let client = UnicastClient::connect(addr).await.unwrap();
        assert!(client.send(b"I'm test").await);

        let (payload, _src) = listener
            .read(Some(Duration::from_secs(2)))
            .await
            .expect("expected a datagram");
        assert_eq!(payload, b"I'm test");
    }

    #[tokio::test]
    async fn closed_listener_reads_none_promptly() {
        let listener = UnicastListener::new().await.unwrap();
        listener.close();
        let started = tokio::time::Instant::now();
        let result = listener.read(Some(Duration::from_secs(5))).await;
        assert!(result.is_none());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn large_payload_is_chunked() {
        // A listener sending to itself: back-to-back datagrams, no
        // reassembly, so the first one read back is exactly MTU bytes.
        let listener = UnicastListener::new().await.unwrap();
        let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), listener.port());

        let payload = vec![b'x'; MTU * 2 + 10];
        assert!(listener.send(addr, &payload).await);

        let (chunk, _) = listener
            .read(Some(Duration::from_secs(2)))
            .await
            .expect("expected a datagram");
        assert_eq!(chunk.len(), MTU);
    }
}
