//! One SNTP (RFC 4330) round trip over UDP
//!
//! The authoritative instant is the server's transmit timestamp, taken from
//! the reply as-is. Receive and transmit stamps are only used for the offset
//! and delay written to the debug log.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::clock::TimeAuthority;
use crate::error::{AppError, Result};
use crate::ClockConfig;

const NTP_PORT: u16 = 123;
const PACKET_LEN: usize = 48;
/// Seconds between 1900-01-01 and 1970-01-01
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;
const VERSION: u8 = 4;
const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const LEAP_UNSYNCHRONIZED: u8 = 3;

/// 64-bit NTP timestamp: seconds since 1900 in the high word, fraction below
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpTimestamp(pub u64);

impl NtpTimestamp {
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        let secs = (instant.timestamp() + NTP_UNIX_OFFSET) as u64 & 0xffff_ffff;
        let frac = ((instant.timestamp_subsec_nanos() as u64) << 32) / 1_000_000_000;
        Self((secs << 32) | frac)
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let mut secs = (self.0 >> 32) as i64;
        // Era 1 starts in 2036
        if secs < 0x8000_0000 {
            secs += 1 << 32;
        }
        let nanos = (((self.0 & 0xffff_ffff) * 1_000_000_000) >> 32) as u32;
        DateTime::from_timestamp(secs - NTP_UNIX_OFFSET, nanos)
    }
}

/// Fields of a server reply this client reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerReply {
    pub stratum: u8,
    pub receive: NtpTimestamp,
    pub transmit: NtpTimestamp,
}

/// Client request carrying `sent` as its transmit timestamp
pub fn request_packet(sent: NtpTimestamp) -> BytesMut {
    let mut packet = BytesMut::with_capacity(PACKET_LEN);
    packet.put_u8((VERSION << 3) | MODE_CLIENT);
    packet.put_bytes(0, 39);
    packet.put_u64(sent.0);
    packet
}

/// Validate a reply to the request stamped `sent`.
pub fn parse_reply(packet: &[u8], sent: NtpTimestamp) -> Result<ServerReply> {
    if packet.len() < PACKET_LEN {
        return Err(AppError::time_sync(format!(
            "short reply of {} bytes",
            packet.len()
        )));
    }

    let mut buf = packet;
    let header = buf.get_u8();
    let stratum = buf.get_u8();
    buf.advance(22);
    let originate = NtpTimestamp(buf.get_u64());
    let receive = NtpTimestamp(buf.get_u64());
    let transmit = NtpTimestamp(buf.get_u64());

    if header & 0x07 != MODE_SERVER {
        return Err(AppError::time_sync(format!(
            "unexpected mode {} in reply",
            header & 0x07
        )));
    }
    if header >> 6 == LEAP_UNSYNCHRONIZED {
        return Err(AppError::time_sync("server clock is not synchronized"));
    }
    if stratum == 0 {
        return Err(AppError::time_sync("kiss-o'-death reply"));
    }
    if originate != sent {
        return Err(AppError::time_sync("reply does not answer this request"));
    }
    if transmit.0 == 0 {
        return Err(AppError::time_sync("reply has no transmit timestamp"));
    }

    Ok(ServerReply {
        stratum,
        receive,
        transmit,
    })
}

/// Single SNTP round trip against a public server
pub struct SntpAuthority {
    server: String,
    timeout: Duration,
}

impl SntpAuthority {
    /// `server` is a host name (port 123) or a full socket address.
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ClockConfig) -> Self {
        Self::new(
            config.server.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn unavailable(&self, e: io::Error) -> AppError {
        AppError::time_sync(format!("{}: {}", self.server, e))
    }

    fn resolve(&self) -> Result<SocketAddr> {
        if let Ok(addr) = self.server.parse::<SocketAddr>() {
            return Ok(addr);
        }
        (self.server.as_str(), NTP_PORT)
            .to_socket_addrs()
            .map_err(|e| self.unavailable(e))?
            .next()
            .ok_or_else(|| AppError::time_sync(format!("{}: no address", self.server)))
    }
}

impl TimeAuthority for SntpAuthority {
    fn query(&self) -> Result<DateTime<Utc>> {
        let addr = self.resolve()?;
        let local = if addr.is_ipv4() {
            SocketAddr::from(([0u8; 4], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(local).map_err(|e| self.unavailable(e))?;
        socket
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| self.unavailable(e))?;
        socket.connect(addr).map_err(|e| self.unavailable(e))?;

        let sent_at = Utc::now();
        let sent = NtpTimestamp::from_datetime(sent_at);
        socket
            .send(&request_packet(sent))
            .map_err(|e| self.unavailable(e))?;

        let mut buf = [0u8; 128];
        let len = socket.recv(&mut buf).map_err(|e| self.unavailable(e))?;
        let received_at = Utc::now();

        let reply = parse_reply(&buf[..len], sent)?;
        let transmit = reply.transmit.to_datetime().ok_or_else(|| {
            AppError::time_sync(format!("malformed transmit time from {}", self.server))
        })?;

        if let Some(receive) = reply.receive.to_datetime() {
            let offset = ((receive - sent_at) + (transmit - received_at)) / 2;
            let delay = (received_at - sent_at) - (transmit - receive);
            debug!(
                "SNTP {} (stratum {}): offset={:.3}ms, delay={:.3}ms",
                self.server,
                reply.stratum,
                millis(offset),
                millis(delay)
            );
        }

        Ok(transmit)
    }
}

fn millis(delta: TimeDelta) -> f64 {
    delta.num_microseconds().unwrap_or_default() as f64 / 1000.0
}
