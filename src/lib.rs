//! Zero-configuration LAN service discovery over IP multicast UDP.
//!
//! A set of replicated [`Daemon`]s announces a named service; a caller on
//! the same multicast-capable network learns, on demand, the IP address
//! (and optional port) of whichever daemon the gossip-based election in
//! [`election`] has made master, via [`get_service_ip`] or
//! [`get_service_ip_and_port`], without any central registry.
//!
//! ```no_run
//! # async fn run() -> service_discovery::Result<()> {
//! use service_discovery::{ClientConfig, ServiceName, get_service_ip};
//!
//! let name = ServiceName::new("my-service")?;
//! let ip = get_service_ip(ClientConfig::new(name)).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod daemon;
pub mod election;
pub mod error;
pub mod multicast;
pub mod protocol;
pub mod unicast;

pub use client::{get_service_ip, get_service_ip_and_port, ServiceAddr};
pub use config::{ClientConfig, DaemonConfig, ServiceName};
pub use daemon::Daemon;
pub use error::{Error, Result};
