//! Component A: the multicast endpoint shared by the sync channel and the
//! main discovery-request channel.
//!
//! Socket setup mirrors a typical `DnsConn::server` approach
//! (`SO_REUSEADDR`, non-blocking `socket2::Socket`, `join_multicast_v4`):
//! bind to the group address when the OS allows it, otherwise fall back to
//! the wildcard address, and join on the default interface rather than
//! enumerating every NIC.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;

use crate::config::DEFAULT_MULTICAST_TTL;
use crate::error::{Error, Result};

/// Poll granularity for the internal recv loop; bounds how promptly a
/// `close()` becomes visible to an in-flight `read()`.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct MulticastEndpoint {
    socket: UdpSocket,
    group: SocketAddr,
    closed: Arc<AtomicBool>,
}

impl MulticastEndpoint {
    pub fn new(group_ip: Ipv4Addr, port: u16) -> Result<Self> {
        Self::with_ttl(group_ip, port, DEFAULT_MULTICAST_TTL)
    }

    pub fn with_ttl(group_ip: Ipv4Addr, port: u16, ttl: u32) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.set_multicast_ttl_v4(ttl)?;

        let group = SocketAddrV4::new(group_ip, port);
        // Bind to the group address where the OS allows it; Windows (and
        // some other stacks) reject binding a multicast address, so fall
        // back to the wildcard address on any bind error.
        if let Err(err) = socket.bind(&SockAddr::from(group)) {
            log::trace!("bind to multicast group {group} failed ({err}), falling back to wildcard");
            let wildcard = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
            socket.bind(&SockAddr::from(wildcard))?;
        }

        if let Err(err) = socket.join_multicast_v4(&group_ip, &Ipv4Addr::UNSPECIFIED) {
            log::error!("failed to join multicast group {group_ip}: {err}");
            return Err(Error::ErrJoiningMulticastGroup);
        }

        let socket = UdpSocket::from_std(socket.into())?;

        Ok(MulticastEndpoint {
            socket,
            group: SocketAddr::V4(group),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Sends `bytes` to the multicast group. Returns `false` on any send
    /// failure without surfacing the error.
    pub async fn send(&self, bytes: &[u8]) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        match self.socket.send_to(bytes, self.group).await {
            Ok(n) => {
                log::trace!("multicast sent {n} bytes to {}", self.group);
                true
            }
            Err(err) => {
                log::warn!("multicast send to {} failed: {err}", self.group);
                false
            }
        }
    }

    /// Reads one datagram, polling in `POLL_INTERVAL` slices so `close()`
    /// is observed promptly. `None` timeout waits until a datagram arrives
    /// or the endpoint is closed.
    pub async fn read(&self, timeout: Option<Duration>) -> Option<(Vec<u8>, SocketAddr)> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let mut buf = [0u8; 65536];

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }

            let slice = match deadline {
                Some(d) => POLL_INTERVAL.min(d.saturating_duration_since(tokio::time::Instant::now())),
                None => POLL_INTERVAL,
            };

            match tokio::time::timeout(slice, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((n, src))) => {
                    log::trace!("multicast received {n} bytes from {src}");
                    return Some((buf[..n].to_vec(), src));
                }
                Ok(Err(err)) => {
                    log::warn!("multicast read error: {err}");
                    return None;
                }
                Err(_elapsed) => {
                    if let Some(d) = deadline {
                        if tokio::time::Instant::now() >= d {
                            return None;
                        }
                    }
                    // Slice elapsed with no deadline reached: loop so we
                    // re-check `closed` at the top.
                }
            }
        }
    }

    /// Idempotent. Subsequent reads return `None` within one poll slice.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
