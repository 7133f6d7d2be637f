//! Reduction of resolved probes into a session summary.

use crate::report::ProbeReport;
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

/// Round-trip statistics over the matched probes of a session.
/// Sub-millisecond precision is preserved; rounding happens only in the
/// `Display` rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttStats {
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

impl RttStats {
    /// `None` when there is no sample: a session without any matched
    /// probe reports "no samples" instead of dividing by zero.
    #[must_use]
    pub fn from_samples(samples: &[Duration]) -> Option<RttStats> {
        if samples.is_empty() {
            return None;
        }
        let sum: Duration = samples.iter().sum();
        Some(RttStats {
            min: *samples.iter().min().expect("samples not empty"),
            avg: sum / (samples.len() as u32),
            max: *samples.iter().max().expect("samples not empty"),
        })
    }
}

/// The immutable outcome of one completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub destination: Ipv4Addr,
    /// Probes actually handed to the socket. Less than the configured
    /// count when the sender aborted mid-session.
    pub transmitted: u16,
    pub matched: u16,
    pub lost: u16,
    /// RTT samples of the matched probes, in resolution order.
    pub rtts: Vec<Duration>,
    pub stats: Option<RttStats>,
}

impl SessionResult {
    pub(crate) fn from_reports(
        destination: Ipv4Addr,
        transmitted: u16,
        reports: &[ProbeReport],
    ) -> SessionResult {
        let rtts: Vec<Duration> = reports
            .iter()
            .filter_map(|report| match report {
                ProbeReport::Matched { rtt, .. } => Some(*rtt),
                ProbeReport::TimedOut { .. } => None,
            })
            .collect();
        let matched = rtts.len() as u16;
        let lost = (reports.len() as u16) - matched;
        let stats = RttStats::from_samples(&rtts);
        SessionResult { destination, transmitted, matched, lost, rtts, stats }
    }

    /// The fixed record shape consumed by the external storage collaborator.
    #[must_use]
    pub fn to_record(&self) -> PingRecord {
        PingRecord {
            created_at: SystemTime::now(),
            ip_version: 4,
            destination: format!("{}:", self.destination),
            rtt: self.stats.map_or(0.0, |stats| millis(stats.avg)),
            packets_sent: self.transmitted,
            packets_lost: self.lost,
        }
    }
}

impl std::fmt::Display for SessionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stats {
            Some(RttStats { min, avg, max }) => write!(
                f,
                "rtt min/avg/max = {:.2}/{:.2}/{:.2}",
                millis(min),
                millis(avg),
                millis(max)
            ),
            None => write!(f, "rtt min/avg/max = */*/*"),
        }
    }
}

/// Result record in the shape the surrounding tooling persists:
/// `{created_at, ip_version, destination "<ip>:<port-or-blank>", rtt,
/// packets_sent, packets_lost}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PingRecord {
    pub created_at: SystemTime,
    pub ip_version: u8,
    pub destination: String,
    pub rtt: f64,
    pub packets_sent: u16,
    pub packets_lost: u16,
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
