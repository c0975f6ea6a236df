use std::io::{self, ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::PingError;
use crate::packet::{self, ICMPEchoPacket, IPv4Header};
use crate::stats::Statistics;

/// How a probe waits for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    /// One receive per probe. An unrelated ICMP message arriving first uses up
    /// the probe, which is then reported as timed out.
    SingleAttempt,
    /// Skip unrelated messages and keep receiving until the deadline.
    DrainUntilDeadline,
}

#[derive(Debug, Clone)]
pub struct PingConfig {
    pub count: u16,
    /// Per-probe wait for a reply.
    pub timeout: Duration,
    /// Pause after each probe completes, before the next one is sent.
    pub interval: Duration,
    pub ttl: u8,
    pub receive_mode: ReceiveMode,
    pub recv_buffer_len: usize,
}

impl Default for PingConfig {
    fn default() -> Self {
        PingConfig {
            count: 4,
            timeout: Duration::from_secs(1),
            interval: Duration::from_secs(1),
            ttl: packet::DEFAULT_TTL,
            receive_mode: ReceiveMode::SingleAttempt,
            recv_buffer_len: 1024,
        }
    }
}

/// Something that can carry whole IP packets.
pub trait Transport {
    fn send_to(&mut self, packet: &[u8], destination: Ipv4Addr) -> io::Result<usize>;

    /// Receive one packet, IP header included. Fails with `WouldBlock` or
    /// `TimedOut` once the read timeout passes.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Wall-clock time source. Also used for the timestamps embedded in probes.
pub trait Clock {
    /// Time since the Unix epoch.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

/// Header-included raw ICMP socket. Closed when dropped.
pub struct RawSocket {
    socket: Socket,
}

impl RawSocket {
    pub fn open(timeout: Duration) -> Result<Self, PingError> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(PingError::from_socket_error)?;

        socket
            .set_header_included(true)
            .map_err(|source| PingError::SocketOption { option: "IP_HDRINCL", source })?;

        let mut raw = RawSocket { socket };
        raw.set_read_timeout(timeout)
            .map_err(|source| PingError::SocketOption { option: "SO_RCVTIMEO", source })?;

        debug!("Opened raw ICMP socket, receive timeout {:?}", timeout);
        Ok(raw)
    }
}

impl Transport for RawSocket {
    fn send_to(&mut self, packet: &[u8], destination: Ipv4Addr) -> io::Result<usize> {
        let addr = SockAddr::from(SocketAddrV4::new(destination, 0));
        self.socket.send_to(packet, &addr)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.read(buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        // A zero SO_RCVTIMEO means "block forever"
        self.socket.set_read_timeout(Some(timeout.max(Duration::from_micros(1))))
    }
}

/// A matched echo reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PongResult {
    pub address: Ipv4Addr,
    pub sequence: u16,
    pub ttl: u8,
    /// Bytes of ICMP message received, IP header excluded.
    pub size: usize,
    pub rtt: Duration,
}

/// What became of one probe.
#[derive(Debug)]
pub enum ProbeOutcome {
    Reply(PongResult),
    TimedOut,
    SendFailed(PingError),
    ReceiveFailed(io::Error),
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub destination: Ipv4Addr,
    pub statistics: Statistics,
    /// Wall-clock time from the first probe to the last outcome, pauses
    /// and timeouts included. This is not the sum of the RTTs.
    pub elapsed: Duration,
}

/// Echo identifier for this process, so concurrent sessions ignore each other's replies.
pub fn process_identifier() -> u16 {
    (std::process::id() & 0xFFFF) as u16
}

pub struct Pinger<T, C> {
    transport: T,
    clock: C,
    config: PingConfig,
    source: Ipv4Addr,
    destination: Ipv4Addr,

    session: u16,  // Used as 'identifier' word to match echo requests/replies
    sequence: u16, // Sequence number of the most recent probe
}

impl<T: Transport, C: Clock> Pinger<T, C> {
    pub fn new(transport: T, clock: C, config: PingConfig, source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Pinger {
            transport,
            clock,
            config,
            source,
            destination,
            session: process_identifier(),
            sequence: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn identifier(&self) -> u16 {
        self.session
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Run every probe, handing each outcome to `report` as it happens.
    pub fn run<F: FnMut(&ProbeOutcome)>(&mut self, mut report: F) -> Summary {
        let started = self.clock.now();
        let mut samples = Vec::with_capacity(self.config.count as usize);

        for i in 0..self.config.count {
            let outcome = self.probe();
            if let ProbeOutcome::Reply(pong) = &outcome {
                samples.push(pong.rtt);
            }
            report(&outcome);

            if i + 1 < self.config.count {
                self.clock.sleep(self.config.interval);
            }
        }

        Summary {
            destination: self.destination,
            statistics: Statistics::compute(&samples, self.config.count as usize),
            elapsed: self.clock.now().saturating_sub(started),
        }
    }

    /// Send one echo request and wait for a reply.
    pub fn probe(&mut self) -> ProbeOutcome {
        if let Err(e) = self.ping() {
            return ProbeOutcome::SendFailed(e);
        }

        match self.receive_pong() {
            Ok(Some(pong)) => ProbeOutcome::Reply(pong),
            Ok(None) => ProbeOutcome::TimedOut,
            Err(e) => {
                warn!("Error receiving reply for icmp_seq={}: {}", self.sequence, e);
                ProbeOutcome::ReceiveFailed(e)
            }
        }
    }

    /// Sends out a ping, returns the icmp_seq (sequence num) used
    pub fn ping(&mut self) -> Result<u16, PingError> {
        self.sequence = self.sequence.wrapping_add(1); // Each new ping updates the sequence
        let sequence = self.sequence;

        let ip = IPv4Header::echo(self.source, self.destination, self.config.ttl);
        let icmp = ICMPEchoPacket::request(self.session, sequence, self.clock.now().as_nanos() as u64);
        let packet = packet::build_packet(ip, icmp).map_err(|source| PingError::Encode { sequence, source })?;

        self.transport
            .send_to(&packet, self.destination)
            .map_err(|source| PingError::Send { sequence, source })?;
        Ok(sequence)
    }

    /// Wait for an echo reply. `Ok(None)` means the probe timed out.
    pub fn receive_pong(&mut self) -> io::Result<Option<PongResult>> {
        let deadline = self.clock.now() + self.config.timeout;

        loop {
            if self.config.receive_mode == ReceiveMode::DrainUntilDeadline {
                let remaining = deadline.saturating_sub(self.clock.now());
                if remaining.is_zero() {
                    return Ok(None);
                }
                self.transport.set_read_timeout(remaining)?;
            }

            let mut buf = vec![0; self.config.recv_buffer_len]; // We want the buffer to be fresh every time
            let n = match self.transport.recv(&mut buf) {
                Ok(n) => n,
                Err(e) if is_timeout(&e) => return Ok(None),
                Err(e) => return Err(e),
            };

            if let Some(pong) = self.match_reply(&buf[..n]) {
                return Ok(Some(pong));
            }

            if self.config.receive_mode == ReceiveMode::SingleAttempt {
                return Ok(None);
            }
        }
    }

    /// Any echo reply carrying our identifier matches, whatever its sequence
    /// number. The RTT comes from the timestamp the reply echoes back.
    fn match_reply(&self, buf: &[u8]) -> Option<PongResult> {
        let (ip, icmp) = match packet::parse_packet(buf) {
            Some(parsed) => parsed,
            None => {
                debug!("Discarding malformed {} byte packet", buf.len());
                return None;
            }
        };

        if ip.protocol != packet::PROTOCOL_ICMP || !icmp.is_echo_reply() {
            debug!(
                "Discarding ICMP type={} code={} from {}",
                icmp.message_type,
                icmp.message_code,
                ip.source_addr()
            );
            return None;
        }
        if icmp.identifier != self.session {
            debug!("Discarding echo reply for identifier {}", icmp.identifier);
            return None;
        }

        let sent = Duration::from_nanos(icmp.timestamp);
        Some(PongResult {
            address: ip.source_addr(),
            sequence: icmp.sequence_num,
            ttl: ip.ttl,
            size: buf.len() - ip.header_len(),
            rtt: self.clock.now().saturating_sub(sent),
        })
    }
}

fn is_timeout(e: &io::Error) -> bool {
    // SO_RCVTIMEO expiry surfaces as EAGAIN on Linux
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
