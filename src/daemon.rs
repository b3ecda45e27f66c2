//! Component D: ties the multicast endpoint, the election engine, and the
//! unicast response path together into one running service provider.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::{DaemonConfig, MCAST_DISCOVER_GRP, MCAST_DISCOVER_SERVER_PORT, MCAST_DISCOVER_SYNC_PORT};
use crate::election::{run_sync_rx, run_sync_tx, SharedState};
use crate::error::Result;
use crate::multicast::MulticastEndpoint;
use crate::protocol::{encode_response, parse_request};
use crate::unicast::UnicastClient;

pub struct Daemon {
    state: Arc<SharedState>,
    request_endpoint: Arc<MulticastEndpoint>,
    sync_endpoint: Arc<MulticastEndpoint>,
    workers: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Constructs a daemon bound to `config.service_name`. Binding both
    /// multicast endpoints happens here so construction can fail fast;
    /// workers are only spawned by [`Daemon::run`].
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let group: Ipv4Addr = MCAST_DISCOVER_GRP.parse()?;

        let request_endpoint = Arc::new(MulticastEndpoint::with_ttl(
            group,
            MCAST_DISCOVER_SERVER_PORT,
            config.multicast_ttl,
        )?);
        let sync_endpoint = Arc::new(MulticastEndpoint::with_ttl(
            group,
            MCAST_DISCOVER_SYNC_PORT,
            config.multicast_ttl,
        )?);

        let state = SharedState::new(config.service_name);
        state.set_service_port(config.service_port);

        Ok(Daemon {
            state,
            request_endpoint,
            sync_endpoint,
            workers: Vec::new(),
        })
    }

    /// Spawns the three cooperating workers (request handler, sync-tx,
    /// sync-rx). Idempotent only in the sense that calling it twice spawns
    /// a second set of workers sharing the same state. Callers should
    /// call it once.
    pub fn run(&mut self) {
        let tx_state = self.state.clone();
        let tx_sync = self.sync_endpoint.clone();
        self.workers
            .push(tokio::spawn(run_sync_tx(tx_state, tx_sync)));

        let rx_state = self.state.clone();
        let rx_sync = self.sync_endpoint.clone();
        self.workers
            .push(tokio::spawn(run_sync_rx(rx_state, rx_sync)));

        let req_state = self.state.clone();
        let req_endpoint = self.request_endpoint.clone();
        self.workers
            .push(tokio::spawn(run_request_handler(req_state, req_endpoint)));
    }

    /// Stops the daemon: flips the shared `run` flag, closes both
    /// multicast endpoints so in-flight reads return promptly, then joins
    /// every worker. Idempotent: a second `stop()` simply has nothing
    /// left to join.
    pub async fn stop(&mut self) {
        self.state.stop();
        self.request_endpoint.close();
        self.sync_endpoint.close();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }

    pub fn set_enable(&self, enable: bool) {
        self.state.set_enable(enable);
    }

    pub fn enabled(&self) -> bool {
        self.state.enabled()
    }

    pub fn is_master(&self) -> bool {
        self.state.is_master()
    }

    pub fn set_port(&self, port: u16) {
        self.state.set_service_port(Some(port));
    }

    pub fn port(&self) -> Option<u16> {
        self.state.service_port()
    }
}

/// Blocks on the main multicast group; only answers while `sync_token ==
/// 0` (we are master), and never answers otherwise.
async fn run_request_handler(state: Arc<SharedState>, endpoint: Arc<MulticastEndpoint>) {
    while state.is_running() {
        let Some((payload, src)) = endpoint.read(None).await else {
            break;
        };

        let Some(ephemeral_port) = parse_request(&state.service_name, &payload) else {
            log::warn!("dropped malformed or mismatched discovery request from {src}");
            continue;
        };

        if !state.is_master() {
            log::trace!(
                "ignoring discovery request from {src}: not master for {}",
                state.service_name
            );
            continue;
        }

        let reply_addr = std::net::SocketAddr::new(src.ip(), ephemeral_port);
        let response = encode_response(&state.service_name, state.service_port());

        match UnicastClient::connect(reply_addr).await {
            Ok(client) => {
                if client.send(&response).await {
                    log::trace!("replied to discovery request from {reply_addr}");
                }
            }
            Err(err) => {
                log::warn!("failed to open unicast reply to {reply_addr}: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceName;
    use std::time::Duration;

    #[tokio::test]
    async fn start_stop_is_clean() {
        let config = DaemonConfig::new(ServiceName::new("daemon-test-start-stop").unwrap());
        let mut daemon = Daemon::new(config).unwrap();
        daemon.run();
        tokio::time::sleep(Duration::from_millis(200)).await;
        daemon.stop().await;
        assert!(!daemon.state.is_running());
    }

    #[tokio::test]
    async fn solo_daemon_eventually_self_promotes() {
        let config = DaemonConfig::new(ServiceName::new("daemon-test-solo-promote").unwrap());
        let mut daemon = Daemon::new(config).unwrap();
        daemon.run();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline && !daemon.is_master() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(daemon.is_master(), "a lone daemon must eventually self-promote");

        daemon.stop().await;
    }
}
