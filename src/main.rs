use clap::{App, AppSettings, Arg};
use colored::*;

use rawping::error::PingError;
use rawping::ping::{PingConfig, Pinger, RawSocket, SystemClock};
use rawping::{report, util};

fn main() {
    env_logger::init();

    let matches = App::new("rawping")
        .setting(AppSettings::ColoredHelp)
        .version("v0.1.0")
        .about("Ping a host with hand-built IPv4 and ICMP headers.\nNeeds root or CAP_NET_RAW.")
        .arg(Arg::with_name("DESTINATION")
            .help("Hostname or IPv4 address")
            .required(true)
            .index(1))
        .get_matches();

    let destination_host = match matches.value_of("DESTINATION") {
        Some(host) => host,
        None => return,
    };

    if let Err(e) = run(destination_host) {
        eprintln!("{} {}", "error:".red().bold(), e);
    }
}

fn run(destination_host: &str) -> Result<(), PingError> {
    let destination = util::resolve_dest(destination_host)?;
    let source = util::local_ipv4();
    let config = PingConfig::default();

    // Dropped, and so closed, on every return path below
    let socket = RawSocket::open(config.timeout)?;
    let mut pinger = Pinger::new(socket, SystemClock, config, source, destination);

    println!("{}", report::banner(destination_host, destination));
    let summary = pinger.run(|outcome| println!("{}", report::outcome_line(outcome)));
    println!("{}", report::summary(&summary));

    Ok(())
}
