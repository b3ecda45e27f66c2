use std::io::Write;

use clap::{App, AppSettings, Arg};
use service_discovery::config::{DaemonConfig, ServiceName};
use service_discovery::daemon::Daemon;
use service_discovery::Error;

// cargo run --example service_daemon -- --service-name my-game --port 7777

#[tokio::main]
async fn main() -> Result<(), Error> {
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

    let mut app = App::new("Service discovery daemon")
        .version("0.1.0")
        .about("Runs a single service-discovery daemon until Ctrl-C")
        .setting(AppSettings::DeriveDisplayOrder)
        .arg(
            Arg::with_name("FULLHELP")
                .help("Prints more detailed help information")
                .long("fullhelp"),
        )
        .arg(
            Arg::with_name("service-name")
                .long("service-name")
                .takes_value(true)
                .default_value("test")
                .help("Service name this daemon announces"),
        )
        .arg(
            Arg::with_name("port")
                .long("port")
                .takes_value(true)
                .help("Optional service port advertised to clients"),
        );

    let matches = app.clone().get_matches();

    if matches.is_present("FULLHELP") {
        app.print_long_help().unwrap();
        std::process::exit(0);
    }

    let service_name = ServiceName::new(matches.value_of("service-name").unwrap())?;
    let mut config = DaemonConfig::new(service_name);
    if let Some(port) = matches.value_of("port") {
        config = config.with_port(port.parse().expect("--port must be a valid u16"));
    }

    let mut daemon = Daemon::new(config)?;
    daemon.run();

    println!("Press ctrl-c to stop daemon");
    tokio::signal::ctrl_c().await.unwrap();
    daemon.stop().await;
    Ok(())
}
