//! Authoritative timestamps from a network time source
//!
//! Every sample carries the local round-trip time of its query, which bounds
//! how far the authoritative instant can be off.

pub mod sntp;

use std::time::Instant;

use chrono::{DateTime, DurationRound, Local, TimeDelta, Utc};
use tracing::{info, warn};

use crate::error::Result;

pub use sntp::SntpAuthority;

/// A source of authoritative time. One call is one round trip, no retries.
pub trait TimeAuthority: Send + Sync {
    fn query(&self) -> Result<DateTime<Utc>>;
}

/// One authoritative timestamp and the error bound of its query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    pub local_send: DateTime<Utc>,
    pub local_receive: DateTime<Utc>,
    pub authoritative: DateTime<Utc>,
    pub round_trip_error_ms: f64,
}

impl TimeSample {
    /// Authoritative instant as local `HH:MM:SS.mmm`
    pub fn authoritative_ms(&self) -> String {
        format_ms(self.authoritative)
    }

    /// Milliseconds from `earlier` to this sample, unclamped.
    pub fn millis_since(&self, earlier: &TimeSample) -> i64 {
        (self.authoritative - earlier.authoritative).num_milliseconds()
    }
}

pub fn format_ms(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%H:%M:%S%.3f")
        .to_string()
}

/// Wraps a [`TimeAuthority`] and measures each query.
pub struct AuthoritativeTimeClient {
    authority: Box<dyn TimeAuthority>,
    max_round_trip_ms: f64,
}

impl AuthoritativeTimeClient {
    pub fn new(authority: impl TimeAuthority + 'static, max_round_trip_ms: f64) -> Self {
        Self {
            authority: Box::new(authority),
            max_round_trip_ms,
        }
    }

    /// Query the authority once. Fails with `TimeSyncUnavailable`.
    pub fn now(&self) -> Result<TimeSample> {
        let local_send = Utc::now();
        let started = Instant::now();
        info!("System time before request: {}", format_ms(local_send));

        let response = self.authority.query();

        let round_trip = started.elapsed();
        let local_receive = Utc::now();
        info!("System time after response: {}", format_ms(local_receive));

        let authoritative = response?;
        let authoritative = authoritative
            .duration_trunc(TimeDelta::milliseconds(1))
            .unwrap_or(authoritative);

        let round_trip_error_ms = round_trip.as_secs_f64() * 1000.0;
        info!("Atomic timestamp time loss: {:.3} ms", round_trip_error_ms);
        if round_trip_error_ms > self.max_round_trip_ms {
            warn!(
                "Round trip of {:.3} ms exceeds {:.0} ms, timestamp is loosely bounded",
                round_trip_error_ms, self.max_round_trip_ms
            );
        }
        metrics::histogram!("time_sync_round_trip_ms").record(round_trip_error_ms);

        Ok(TimeSample {
            local_send,
            local_receive,
            authoritative,
            round_trip_error_ms,
        })
    }
}
