use std::io::Write;
use std::time::Duration;

use clap::{App, Arg};
use service_discovery::config::{ClientConfig, ServiceName};
use service_discovery::get_service_ip_and_port;

// cargo run --example service_daemon_query -- --service-name my-game --timeout 5

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Trace)
        .init();

    let matches = App::new("Service discovery query")
        .version("0.1.0")
        .about("Looks up the current master for a service and prints its address")
        .arg(
            Arg::with_name("service-name")
                .long("service-name")
                .takes_value(true)
                .default_value("test")
                .help("Service name to look up"),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .takes_value(true)
                .default_value("5")
                .help("Seconds to wait for a master before giving up"),
        )
        .arg(
            Arg::with_name("retry")
                .long("retry")
                .takes_value(true)
                .help("Number of retries; omit to retry forever"),
        )
        .get_matches();

    let service_name =
        ServiceName::new(matches.value_of("service-name").unwrap()).expect("valid service name");
    let timeout_secs: u64 = matches
        .value_of("timeout")
        .unwrap()
        .parse()
        .expect("--timeout must be a valid number of seconds");
    let retry = matches
        .value_of("retry")
        .map(|v| v.parse().expect("--retry must be a valid u32"));

    let config = ClientConfig::new(service_name)
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_retry(retry);

    log::trace!("looking up master for service {}", config.service_name);

    match get_service_ip_and_port(config).await {
        Ok(Some(addr)) => println!("found master at {} (port {:?})", addr.ip, addr.port),
        Ok(None) => println!("no master found within the discovery budget"),
        Err(err) => eprintln!("discovery failed: {err}"),
    }
}
