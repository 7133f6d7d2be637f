//! Per-probe output events, one per resolved probe, in sequence order.

use crate::probe::{SequenceNumber, Ttl};
use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::time::Duration;

/// The terminal state of one probe. Exactly one report is emitted per
/// sequence number; a probe is never revisited afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeReport {
    Matched {
        payload_size: usize,
        source: Ipv4Addr,
        ttl: Ttl,
        sequence: SequenceNumber,
        rtt: Duration,
    },
    TimedOut {
        sequence: SequenceNumber,
    },
}

impl std::fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeReport::Matched { payload_size, source, ttl, sequence, rtt } => {
                let rtt_ms = rtt.as_secs_f64() * 1000.0;
                write!(
                    f,
                    "{payload_size} bytes from {source}: icmp_seq={sequence} ttl={ttl} time={rtt_ms:.2} ms"
                )
            }
            ProbeReport::TimedOut { sequence: _ } => write!(f, "*** Ping timeout ***"),
        }
    }
}

pub(crate) type ReportSender = mpsc::SyncSender<ProbeReport>;
pub(crate) type ReportReceiver = mpsc::Receiver<ProbeReport>;

pub(crate) fn report_channel(channel_size: usize) -> (ReportSender, ReportReceiver) {
    mpsc::sync_channel::<ProbeReport>(channel_size)
}
