use std::time::Duration;

use crate::error::{Error, Result};

/// Multicast group all discovery traffic is sent on.
pub const MCAST_DISCOVER_GRP: &str = "224.1.1.1";
/// Port daemons listen on for discovery requests.
pub const MCAST_DISCOVER_SERVER_PORT: u16 = 5005;
/// Port daemons gossip sync tokens on.
pub const MCAST_DISCOVER_SYNC_PORT: u16 = 5007;
/// How long a sync-rx read waits before treating the channel as silent.
pub const MCAST_SYNC_READ_TIME: Duration = Duration::from_millis(500);
/// How often a candidate re-broadcasts its sync token.
pub const MCAST_SYNC_SEND_TIME: Duration = Duration::from_millis(500);
/// Consecutive self-echoes required before a lone candidate self-promotes.
pub const READ_OWN_MAX_COUNT: u32 = 3;
/// Default outgoing multicast TTL, enough to cross a couple of routed hops.
pub const DEFAULT_MULTICAST_TTL: u32 = 2;
/// Largest single datagram a unicast endpoint will emit unsplit.
pub const MTU: usize = 1500;
/// Upper bound of the initial random candidate sync token.
pub const MAX_INITIAL_TOKEN: u64 = 1_000_000;

/// A validated service name: non-empty ASCII, and free of the two bytes the
/// wire grammar uses as separators (`#` and `.`) so framing is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::ErrEmptyServiceName);
        }
        if !name.is_ascii() {
            return Err(Error::Other(format!(
                "service name {name:?} is not ASCII"
            )));
        }
        if name.contains('#') || name.contains('.') {
            return Err(Error::ErrReservedByteInServiceName('#', '.'));
        }
        Ok(ServiceName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration a daemon is constructed with.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Service name this daemon announces and elects a master for.
    pub service_name: ServiceName,

    /// Optional fixed port advertised to clients alongside the master's IP.
    pub service_port: Option<u16>,

    /// Outgoing multicast TTL. Defaults to [`DEFAULT_MULTICAST_TTL`].
    pub multicast_ttl: u32,
}

impl DaemonConfig {
    pub fn new(service_name: ServiceName) -> Self {
        DaemonConfig {
            service_name,
            service_port: None,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.service_port = Some(port);
        self
    }

    pub fn with_multicast_ttl(mut self, ttl: u32) -> Self {
        self.multicast_ttl = ttl;
        self
    }
}

/// Configuration a single `getServiceIP`/`getServiceIPAndPort` call is made with.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub service_name: ServiceName,

    /// Per-step budget: how long the election barrier and each request
    /// attempt are allowed to wait.
    pub timeout: Duration,

    /// Request-attempt cap. Negative (modeled as `None`) means unbounded.
    pub retry: Option<u32>,
}

impl ClientConfig {
    pub fn new(service_name: ServiceName) -> Self {
        ClientConfig {
            service_name,
            timeout: Duration::from_secs(5),
            retry: Some(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `None` retries forever, matching the source's `retry < 0` sentinel.
    pub fn with_retry(mut self, retry: Option<u32>) -> Self {
        self.retry = retry;
        self
    }
}
