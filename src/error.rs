use std::io;

use thiserror::Error;

/// Everything that can go wrong while pinging.
///
/// Setup variants abort the run before any probe is sent; `Encode` and `Send`
/// only cost the probe they belong to.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("cannot resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },

    #[error("no IPv4 address found for {0}")]
    NoIpv4(String),

    #[error("raw sockets need elevated privileges (run as root or grant CAP_NET_RAW): {0}")]
    PermissionDenied(#[source] io::Error),

    #[error("error creating raw socket: {0}")]
    Socket(#[source] io::Error),

    #[error("failed to set {option}: {source}")]
    SocketOption {
        option: &'static str,
        source: io::Error,
    },

    #[error("error encoding icmp_seq={sequence}: {source}")]
    Encode {
        sequence: u16,
        source: bincode::Error,
    },

    #[error("error sending icmp_seq={sequence}: {source}")]
    Send { sequence: u16, source: io::Error },
}

impl PingError {
    /// Classify a failed raw socket creation.
    pub fn from_socket_error(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => PingError::PermissionDenied(e),
            _ => PingError::Socket(e),
        }
    }

    /// The sequence number of the probe this error cost, if any.
    #[cfg(test)]
    pub(crate) fn sequence(&self) -> Option<u16> {
        match self {
            PingError::Encode { sequence, .. } | PingError::Send { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}
