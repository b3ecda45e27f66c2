//! Component E: a single discovery attempt, from a client's point of view.

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use crate::config::{ClientConfig, MCAST_DISCOVER_GRP, MCAST_DISCOVER_SERVER_PORT, MCAST_DISCOVER_SYNC_PORT, MCAST_SYNC_READ_TIME};
use crate::error::Result;
use crate::multicast::MulticastEndpoint;
use crate::protocol::{encode_request, parse_response, parse_sync};
use crate::unicast::UnicastListener;

/// Result of a successful discovery: the master's address and, if the
/// operator set one, its advertised service port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceAddr {
    pub ip: IpAddr,
    pub port: Option<u16>,
}

/// `getServiceIP`: discovers the master and returns only its IP.
pub async fn get_service_ip(config: ClientConfig) -> Result<Option<IpAddr>> {
    Ok(get_service_ip_and_port(config).await?.map(|a| a.ip))
}

/// `getServiceIPAndPort`: runs the full client protocol. Opens endpoints,
/// waits on the election barrier, then requests/reads up to `retry` times
/// (or forever if `retry` is `None`).
pub async fn get_service_ip_and_port(config: ClientConfig) -> Result<Option<ServiceAddr>> {
    let group: Ipv4Addr = MCAST_DISCOVER_GRP.parse()?;

    let requester = MulticastEndpoint::new(group, MCAST_DISCOVER_SERVER_PORT)?;
    let listener = UnicastListener::new().await?;
    let sync_listener = MulticastEndpoint::new(group, MCAST_DISCOVER_SYNC_PORT)?;

    if !wait_for_master(&sync_listener, &config, &config.service_name).await {
        listener.close();
        sync_listener.close();
        requester.close();
        return Ok(None);
    }

    let request = encode_request(&config.service_name, listener.port());

    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        log::trace!(
            "{}: sending discovery request (attempt {attempts})",
            config.service_name
        );
        requester.send(&request).await;

        if let Some((payload, src)) = listener.read(Some(config.timeout)).await {
            if let Some(port) = parse_response(&config.service_name, &payload) {
                log::debug!(
                    "{}: discovered master at {} (port {port:?})",
                    config.service_name,
                    src.ip()
                );
                listener.close();
                sync_listener.close();
                requester.close();
                return Ok(Some(ServiceAddr { ip: src.ip(), port }));
            }
        }

        let give_up = match config.retry {
            Some(retry) => attempts > retry,
            None => false,
        };
        if give_up {
            log::debug!(
                "{}: giving up after {attempts} attempts with no response",
                config.service_name
            );
            listener.close();
            sync_listener.close();
            requester.close();
            return Ok(None);
        }
    }
}

/// Reads the sync channel until a message carries token `0` (a live
/// master exists), or `config.timeout` elapses with no such observation.
async fn wait_for_master(
    sync_listener: &MulticastEndpoint,
    config: &ClientConfig,
    service_name: &crate::config::ServiceName,
) -> bool {
    log::debug!(
        "{service_name}: entering election barrier (timeout {:?})",
        config.timeout
    );
    let start = Instant::now();

    loop {
        let remaining = config.timeout.saturating_sub(start.elapsed());
        if remaining == Duration::ZERO {
            log::debug!("{service_name}: election barrier timed out; no master observed");
            return false;
        }

        let read_budget = (MCAST_SYNC_READ_TIME * 2).min(remaining);
        match sync_listener.read(Some(read_budget)).await {
            None => {
                if start.elapsed() >= config.timeout {
                    log::debug!("{service_name}: election barrier timed out; no master observed");
                    return false;
                }
                // A single read-timeout slice elapsing isn't the overall
                // barrier timeout; keep waiting until config.timeout does.
            }
            Some((payload, _src)) => {
                if let Some(token) = parse_sync(service_name, &payload) {
                    if token == 0 {
                        log::debug!("{service_name}: observed live master; barrier satisfied");
                        return true;
                    }
                }
            }
        }

        if start.elapsed() >= config.timeout {
            log::debug!("{service_name}: election barrier timed out; no master observed");
            return false;
        }
    }
}
