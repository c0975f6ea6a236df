use std::net::Ipv4Addr;
use std::time::Duration;

use colored::*;

use crate::packet::{ECHO_PACKET_LEN, ICMP_ECHO_LEN};
use crate::ping::{ProbeOutcome, Summary};

fn millis(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64() * 1000f64)
}

pub fn banner(host: &str, destination: Ipv4Addr) -> String {
    format!(
        "{} {} ({}): {}({}) bytes of data.",
        "PING".cyan(),
        host.bold(),
        destination,
        ICMP_ECHO_LEN,
        ECHO_PACKET_LEN
    )
}

/// The line printed for a single probe.
pub fn outcome_line(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Reply(pong) => format!(
            "{} bytes from {}: icmp_seq={} ttl={} time={} ms",
            pong.size,
            pong.address.to_string().yellow(),
            pong.sequence.to_string().bold(),
            pong.ttl.to_string().bold(),
            millis(pong.rtt).bold()
        ),
        ProbeOutcome::TimedOut => "Request timed out.".red().to_string(),
        ProbeOutcome::SendFailed(e) => format!("{}", e.to_string().red()),
        ProbeOutcome::ReceiveFailed(e) => format!("{} {}", "Error receiving reply:".red(), e),
    }
}

pub fn summary(summary: &Summary) -> String {
    let stats = &summary.statistics;
    format!(
        "\n{} {} {}\n\
         {} packets transmitted, {} received, {}% packet loss, time {}ms\n\
         rtt min/avg/max/mdev = {}/{}/{}/{} ms",
        "---".yellow(),
        summary.destination.to_string().bold(),
        "ping statistics ---".yellow(),
        stats.transmitted.to_string().bold(),
        stats.received.to_string().bold(),
        format!("{:.1}", stats.loss_percent).bold(),
        summary.elapsed.as_millis(),
        millis(stats.min),
        millis(stats.avg),
        millis(stats.max),
        millis(stats.mdev)
    )
}
