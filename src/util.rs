use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use dns_lookup::lookup_host;
use log::{debug, warn};

use crate::error::PingError;

/// Resolve a hostname or literal IPv4 address to the first IPv4 address it names.
pub fn resolve_dest(dest: &str) -> Result<Ipv4Addr, PingError> {
    if let Ok(addr) = dest.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    let addrs = lookup_host(dest).map_err(|source| PingError::Resolve {
        host: dest.to_string(),
        source,
    })?;
    debug!("{} resolved to {:?}", dest, addrs);

    first_ipv4(addrs).ok_or_else(|| PingError::NoIpv4(dest.to_string()))
}

fn first_ipv4<I: IntoIterator<Item = IpAddr>>(addrs: I) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    })
}

/// The address this host would use to reach the public internet.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel to pick a
/// route. Falls back to `0.0.0.0`, which the kernel fills in for header-included
/// raw sockets.
pub fn local_ipv4() -> Ipv4Addr {
    let discovered = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|sock| sock.connect(("8.8.8.8", 80)).map(|_| sock))
        .and_then(|sock| sock.local_addr());

    match discovered {
        Ok(addr) => match addr.ip() {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        },
        Err(e) => {
            warn!("Could not discover local address, using 0.0.0.0: {}", e);
            Ipv4Addr::UNSPECIFIED
        }
    }
}

/// RFC 1071 Internet checksum over `data`.
///
/// A trailing odd byte is treated as the high byte of a zero-padded word.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = sum_be_words(data);
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }

    !sum as u16 // The checksum field should be the ones complement of the sum
}

/// Sum all words (16 bit chunks) in the given data. Each word is treated as big endian.
fn sum_be_words(data: &[u8]) -> u32 {
    data.chunks(2)
        .map(|word| match *word {
            [wh] => u16::from_be_bytes([wh, 0]),
            [wh, wl] => u16::from_be_bytes([wh, wl]),
            _ => unreachable!(),
        })
        .fold(0u32, |sum, w| sum.wrapping_add(w as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn checksum_of_empty_is_all_ones() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn checksum_pads_odd_byte_high() {
        assert_eq!(checksum(&[0xFF]), 0x00FF);
        assert_eq!(checksum(&[0x12, 0x34, 0x56]), !(0x1234u16 + 0x5600));
    }

    #[test]
    fn checksum_matches_rfc1071_example() {
        // Section 3 of RFC 1071: the folded sum is 0xddf2.
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), !0xddf2);
    }

    #[test]
    fn checksum_folds_repeated_carries() {
        let data = [0xFF; 64];
        assert_eq!(checksum(&data), 0x0000);
    }

    #[test]
    fn embedded_checksum_verifies() {
        let mut header = vec![0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x00, 0x00, 0x40, 0x01];
        header.extend_from_slice(&[0, 0]);
        header.extend_from_slice(&[10, 0, 0, 1, 93, 184, 216, 34]);

        let buffers = vec![
            (vec![0u8; 2], 0),
            (vec![0xFF; 2], 0),
            (vec![0xAB, 0xCD, 0x00, 0x00], 2),
            (vec![0xFF; 64], 10),
            ((0..=255u8).collect::<Vec<_>>(), 100),
            (header, 10),
        ];

        for (mut data, at) in buffers {
            // The checksum field starts out zeroed.
            data[at..at + 2].copy_from_slice(&[0, 0]);
            let sum = checksum(&data);
            data[at..at + 2].copy_from_slice(&sum.to_be_bytes());

            assert_eq!(checksum(&data), 0, "{} byte buffer", data.len());
            data[at..at + 2].copy_from_slice(&[0, 0]);
            assert_eq!(checksum(&data), sum, "{} byte buffer", data.len());
        }

        // Nothing to embed in an empty buffer, but its checksum is still defined.
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn checksum_is_idempotent() {
        let data = b"rawping echo data";
        assert_eq!(checksum(data), checksum(data));
    }

    #[test]
    fn literal_address_skips_lookup() {
        assert_eq!(resolve_dest("192.0.2.7").unwrap(), Ipv4Addr::new(192, 0, 2, 7));
    }

    #[test]
    fn first_ipv4_skips_v6_records() {
        let addrs = vec![
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)),
            IpAddr::V4(Ipv4Addr::new(198, 51, 100, 2)),
        ];
        assert_eq!(first_ipv4(addrs), Some(Ipv4Addr::new(198, 51, 100, 1)));
        assert_eq!(first_ipv4(vec![IpAddr::V6(Ipv6Addr::LOCALHOST)]), None);
    }
}
