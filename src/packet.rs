//! Wire layout of the IPv4 and ICMP echo headers.
//!
//! Both headers are plain structs whose field order is the wire order. They are
//! encoded with bincode in fixed-int, big-endian mode, so each field lands at
//! the offset listed next to it.

use std::net::Ipv4Addr;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::util;

pub const IPV4_HEADER_LEN: usize = 20;
pub const ICMP_HEADER_LEN: usize = 8;
pub const ECHO_DATA_LEN: usize = 8;
pub const ICMP_ECHO_LEN: usize = ICMP_HEADER_LEN + ECHO_DATA_LEN;
pub const ECHO_PACKET_LEN: usize = IPV4_HEADER_LEN + ICMP_ECHO_LEN;

/// Anything shorter cannot hold an IP header and an ICMP header.
pub const MIN_REPLY_LEN: usize = IPV4_HEADER_LEN + ICMP_HEADER_LEN;

/// Total length written into outbound IP headers: IP header plus fixed ICMP
/// header. The kernel rewrites it under IP_HDRINCL to the real buffer length.
pub const ECHO_TOTAL_LENGTH: u16 = MIN_REPLY_LEN as u16;

pub const PROTOCOL_ICMP: u8 = 1;
pub const ECHO_REQUEST_V4: u8 = 8;
pub const ECHO_REPLY_V4: u8 = 0;
pub const DEFAULT_TTL: u8 = 64;

const VERSION_AND_IHL: u8 = 0x45; // IPv4, 5 * 4 = 20 bytes

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IPv4Header {
    pub version_and_header_len: u8, // 0
    pub type_of_service: u8,        // 1
    pub total_length: u16,          // 2..4
    pub identification: u16,        // 4..6
    pub flags_and_frag_offset: u16, // 6..8
    pub ttl: u8,                    // 8
    pub protocol: u8,               // 9
    pub checksum: u16,              // 10..12
    pub source: [u8; 4],            // 12..16
    pub destination: [u8; 4],       // 16..20
}

/// ICMP echo request/reply header followed by its 8-byte data field.
///
/// The data field carries the transmit time in nanoseconds since the Unix
/// epoch, so a reply can be timed without remembering when it was sent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ICMPEchoPacket {
    pub message_type: u8,  // 0
    pub message_code: u8,  // 1
    pub checksum: u16,     // 2..4
    pub identifier: u16,   // 4..6
    pub sequence_num: u16, // 6..8
    pub timestamp: u64,    // 8..16
}

impl IPv4Header {
    /// Header for an outbound echo request between `source` and `destination`.
    pub fn echo(source: Ipv4Addr, destination: Ipv4Addr, ttl: u8) -> Self {
        IPv4Header {
            version_and_header_len: VERSION_AND_IHL,
            type_of_service: 0,
            total_length: ECHO_TOTAL_LENGTH,
            identification: 0,
            flags_and_frag_offset: 0,
            ttl,
            protocol: PROTOCOL_ICMP,
            checksum: 0,
            source: source.octets(),
            destination: destination.octets(),
        }
    }

    /// Get the 'header length' portion of the first byte, which is encoded as bytes/4.
    pub fn header_len(&self) -> usize {
        4 * (self.version_and_header_len & 0x0F) as usize
    }

    pub fn source_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.source)
    }
}

impl ICMPEchoPacket {
    pub fn request(identifier: u16, sequence_num: u16, timestamp: u64) -> Self {
        ICMPEchoPacket {
            message_type: ECHO_REQUEST_V4,
            message_code: 0,
            checksum: 0,
            identifier,
            sequence_num,
            timestamp,
        }
    }

    pub fn is_echo_reply(&self) -> bool {
        self.message_type == ECHO_REPLY_V4 && self.message_code == 0
    }
}

trait Checksummed: Serialize {
    fn checksum_mut(&mut self) -> &mut u16;
}

impl Checksummed for IPv4Header {
    fn checksum_mut(&mut self) -> &mut u16 {
        &mut self.checksum
    }
}

impl Checksummed for ICMPEchoPacket {
    fn checksum_mut(&mut self) -> &mut u16 {
        &mut self.checksum
    }
}

fn coder() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian() // Both headers use network byte order
        .allow_trailing_bytes()
}

/// Serialize with a zeroed checksum, then again with the real one filled in.
fn encode_with_checksum<T: Checksummed>(header: &mut T) -> bincode::Result<Vec<u8>> {
    *header.checksum_mut() = 0;
    let zeroed = coder().serialize(&*header)?;
    *header.checksum_mut() = util::checksum(&zeroed);
    coder().serialize(&*header)
}

/// Assemble a complete IP + ICMP echo packet with both checksums set.
pub fn build_packet(mut ip: IPv4Header, mut icmp: ICMPEchoPacket) -> bincode::Result<Vec<u8>> {
    let icmp_bytes = encode_with_checksum(&mut icmp)?;
    let mut packet = encode_with_checksum(&mut ip)?;
    packet.extend_from_slice(&icmp_bytes);
    Ok(packet)
}

/// Split a received buffer into its IP header and ICMP echo message.
///
/// Returns `None` for anything that cannot be an echo message: buffers shorter
/// than an IP header plus an ICMP header, non-IPv4 data, or an ICMP message cut
/// short before the end of its data field.
pub fn parse_packet(buf: &[u8]) -> Option<(IPv4Header, ICMPEchoPacket)> {
    if buf.len() < MIN_REPLY_LEN {
        return None;
    }

    let ip: IPv4Header = coder().deserialize(buf).ok()?;
    if ip.version_and_header_len >> 4 != 4 || ip.header_len() < IPV4_HEADER_LEN {
        return None;
    }

    // The ICMP portion will be located after the IP header
    let icmp = buf.get(ip.header_len()..)?;
    if icmp.len() < ICMP_ECHO_LEN {
        return None;
    }
    let icmp: ICMPEchoPacket = coder().deserialize(icmp).ok()?;

    Some((ip, icmp))
}
