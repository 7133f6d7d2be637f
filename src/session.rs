//! One probing session: both threads, their channels, and the join barrier.

use crate::error::{ProbeError, ProbeResult};
use crate::packet::default_payload;
use crate::receiver::ProbeReceiver;
use crate::records::send_record_channel;
use crate::report::{report_channel, ProbeReport, ReportReceiver};
use crate::sender::{ProbeSender, SendTally};
use crate::socket::{ProbeSocket, RawSocket};
use crate::stats::SessionResult;
use rand::Rng;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Immutable description of a probing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub destination: Ipv4Addr,
    /// Number of probes, `>= 1`.
    pub count: u16,
    /// Time budget per probe.
    pub probe_timeout: Duration,
    /// Fixed inter-probe send cadence.
    pub interval: Duration,
    /// Local address to bind the socket to. `None` leaves the bind to the
    /// kernel.
    pub source: Option<Ipv4Addr>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(destination: Ipv4Addr) -> SessionConfig {
        SessionConfig {
            destination,
            count: 3,
            probe_timeout: Duration::from_secs(2),
            interval: Duration::from_secs(1),
            source: None,
        }
    }
}

pub struct Session;

impl Session {
    /// Opens the raw socket and starts the sender and receiver threads.
    ///
    /// Failing to acquire the socket (usually for lack of privilege) is a
    /// fatal precondition failure; no probe is sent.
    pub fn start(config: SessionConfig) -> ProbeResult<SessionHandle> {
        if config.count == 0 {
            return Err(ProbeError::new("probe count must be at least 1"));
        }
        let socket = RawSocket::new(config.source).map_err(|e| {
            ProbeError::with_source(
                "could not create raw ICMPv4 socket (insufficient privilege?)",
                Box::new(e),
            )
        })?;
        // A fresh 16-bit identifier distinguishes this session's replies
        // from other concurrent ICMP traffic on the host.
        let identifier: u16 = rand::thread_rng().gen();
        Ok(Self::start_with_socket(config, socket, identifier))
    }

    pub(crate) fn start_with_socket<S>(
        config: SessionConfig,
        socket: S,
        identifier: u16,
    ) -> SessionHandle
    where
        S: ProbeSocket + 'static,
    {
        let socket = Arc::new(socket);
        let channel_size = usize::from(config.count);
        let (record_tx, record_rx) = send_record_channel(channel_size);
        let (report_tx, report_rx) = report_channel(channel_size);

        let sender = ProbeSender::new(
            Arc::clone(&socket),
            record_tx,
            identifier,
            config.destination,
            config.interval,
            default_payload().to_vec(),
        );
        let receiver = ProbeReceiver::new(
            socket,
            record_rx,
            report_tx,
            identifier,
            config.destination,
            config.probe_timeout,
        );

        let count = config.count;
        let sender_thread = std::thread::spawn(move || sender.run(count));
        let receiver_thread = std::thread::spawn(move || receiver.run(count));

        SessionHandle {
            destination: config.destination,
            report_rx,
            sender_thread,
            receiver_thread,
        }
    }
}

/// A running session. Statistics become available only through [`wait`],
/// after both threads have been joined.
///
/// [`wait`]: SessionHandle::wait
pub struct SessionHandle {
    destination: Ipv4Addr,
    report_rx: ReportReceiver,
    sender_thread: JoinHandle<SendTally>,
    receiver_thread: JoinHandle<ProbeResult<Vec<ProbeReport>>>,
}

impl SessionHandle {
    /// Iterates over per-probe reports as they resolve. The iterator ends
    /// when the receiver thread finishes.
    pub fn reports(&self) -> impl Iterator<Item = ProbeReport> + '_ {
        self.report_rx.iter()
    }

    /// Joins both threads, then aggregates. Every probe has reached a
    /// terminal state once this returns.
    ///
    /// A mid-session send failure does not fail the session: statistics
    /// for the probes already resolved are still reported, the failure is
    /// logged. A fatal receive error aborts with `Err`.
    pub fn wait(self) -> ProbeResult<SessionResult> {
        let tally = self
            .sender_thread
            .join()
            .map_err(|_| ProbeError::new("sender thread panicked"))?;
        let reports = self
            .receiver_thread
            .join()
            .map_err(|_| ProbeError::new("receiver thread panicked"))??;

        if let Some(failure) = &tally.failure {
            tracing::error!(
                "sender aborted after {} of its probes: {}",
                tally.transmitted,
                failure
            );
        }
        Ok(SessionResult::from_reports(self.destination, tally.transmitted, &reports))
    }
}
