//! ICMP echo over header-included raw IPv4 sockets.
//!
//! The crate builds both the IP and ICMP headers itself, times replies from the
//! timestamp they echo back, and summarizes the run the way `ping` does.

pub mod error;
pub mod packet;
pub mod ping;
pub mod report;
pub mod stats;
pub mod util;
