//! End-to-end discovery/election scenarios, run over real loopback
//! multicast sockets rather than a mocked `UdpSocket`. Service names are
//! unique per test so concurrently-running tests don't see each other's
//! sync/request traffic on the shared fixed ports.

use std::time::Duration;

use service_discovery::config::{ClientConfig, DaemonConfig, ServiceName};
use service_discovery::daemon::Daemon;
use service_discovery::{get_service_ip, get_service_ip_and_port};

fn unique_name(label: &str) -> ServiceName {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    ServiceName::new(format!("it-{label}-{n}")).unwrap()
}

/// Scenario 1, start/stop: create a daemon, run it, sleep, stop it, and
/// confirm no worker is left running.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_stop() {
    let mut daemon = Daemon::new(DaemonConfig::new(unique_name("start-stop"))).unwrap();
    daemon.run();
    tokio::time::sleep(Duration::from_secs(2)).await;
    daemon.stop().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    // stop() has already joined every worker; a second stop is a no-op.
    daemon.stop().await;
}

/// Scenario 2, single-provider discovery.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_provider_discovery() {
    let service = unique_name("single-provider");

    let mut daemon = Daemon::new(DaemonConfig::new(service.clone())).unwrap();
    daemon.run();

    let client_config = ClientConfig::new(service)
        .with_timeout(Duration::from_secs(5))
        .with_retry(Some(5));
    let ip = get_service_ip(client_config).await.unwrap();

    assert!(ip.is_some());
    assert!(ip.unwrap().is_ipv4());

    daemon.stop().await;
}

/// Scenario 3, multi-provider election: four daemons share one service
/// name; two sequential client calls return the same IP, and that IP
/// belongs to the daemon whose `is_master()` is true.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn multi_provider_election_is_stable() {
    let service = unique_name("multi-provider");

    let mut daemons = Vec::new();
    for _ in 0..4 {
        let mut d = Daemon::new(DaemonConfig::new(service.clone())).unwrap();
        d.run();
        daemons.push(d);
    }

    // Give the election a few rounds to converge.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let masters: Vec<usize> = daemons
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_master())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(masters.len(), 1, "exactly one daemon must be master");

    let cfg1 = ClientConfig::new(service.clone())
        .with_timeout(Duration::from_secs(5))
        .with_retry(Some(5));
    let ip1 = get_service_ip(cfg1).await.unwrap().unwrap();

    let cfg2 = ClientConfig::new(service)
        .with_timeout(Duration::from_secs(5))
        .with_retry(Some(5));
    let ip2 = get_service_ip(cfg2).await.unwrap().unwrap();

    assert_eq!(ip1, ip2, "sequential discoveries must agree on the master");

    for mut d in daemons {
        d.stop().await;
    }
}

/// Scenario 4, port advertisement: four daemons with distinct ports;
/// `getServiceIPAndPort` returns a port from that set, and the daemon
/// owning it is the master.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn port_advertisement_matches_master() {
    let service = unique_name("port-advert");
    let ports = [1001u16, 1002, 1003, 1004];

    let mut daemons = Vec::new();
    for &port in &ports {
        let mut d = Daemon::new(DaemonConfig::new(service.clone()).with_port(port)).unwrap();
        d.run();
        daemons.push(d);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    let client_config = ClientConfig::new(service)
        .with_timeout(Duration::from_secs(5))
        .with_retry(Some(5));
    let addr = get_service_ip_and_port(client_config).await.unwrap().unwrap();

    let returned_port = addr.port.expect("daemon set a service port");
    assert!(ports.contains(&returned_port));

    let owner = daemons
        .iter()
        .find(|d| d.port() == Some(returned_port))
        .expect("one daemon must own the returned port");
    assert!(owner.is_master());

    for mut d in daemons {
        d.stop().await;
    }
}

/// Scenario 6, no provider: a client retries a bounded number of times
/// against an empty network and gives up within roughly 2x the timeout.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_provider_returns_none() {
    let service = unique_name("no-provider");
    let timeout = Duration::from_secs(2);

    let started = tokio::time::Instant::now();
    let client_config = ClientConfig::new(service)
        .with_timeout(timeout)
        .with_retry(Some(0));
    let ip = get_service_ip(client_config).await.unwrap();

    assert!(ip.is_none());
    assert!(started.elapsed() < timeout * 3);
}

/// Scenario 5 (scaled down from 50): many daemons, many concurrent
/// clients: every client must agree on the same port, owned by the
/// unique master.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn stress_convergence_scaled() {
    let service = unique_name("stress");
    const N: u16 = 10;

    let mut daemons = Vec::new();
    for i in 0..N {
        let mut d =
            Daemon::new(DaemonConfig::new(service.clone()).with_port(2000 + i)).unwrap();
        d.run();
        daemons.push(d);
    }

    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut client_tasks = Vec::new();
    for _ in 0..N {
        let cfg = ClientConfig::new(service.clone())
            .with_timeout(Duration::from_secs(5))
            .with_retry(Some(10));
        client_tasks.push(tokio::spawn(async move {
            get_service_ip_and_port(cfg).await.unwrap()
        }));
    }

    let mut results = Vec::new();
    for task in client_tasks {
        results.push(task.await.unwrap().expect("each client must discover a master"));
    }

    let first_port = results[0].port;
    assert!(results.iter().all(|r| r.port == first_port));

    let owner = daemons
        .iter()
        .find(|d| d.port() == first_port)
        .expect("some daemon must own the agreed-upon port");
    assert!(owner.is_master());

    let master_count = daemons.iter().filter(|d| d.is_master()).count();
    assert_eq!(master_count, 1);

    for mut d in daemons {
        d.stop().await;
    }
}
