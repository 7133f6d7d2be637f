//! The receiving half of a probing session.

use crate::decode::{decode_datagram, InboundDatagram};
use crate::error::{ProbeError, ProbeResult};
use crate::probe::{SequenceNumber, Ttl};
use crate::records::{SendRecord, SendRecordReceiver};
use crate::report::{ProbeReport, ReportSender};
use crate::socket::{CaptureGuard, ProbeSocket};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const RECV_BUFFER_LEN: usize = 512;

pub(crate) struct ProbeReceiver<S> {
    socket: Arc<S>,
    record_rx: SendRecordReceiver,
    report_tx: ReportSender,
    identifier: u16,
    destination: Ipv4Addr,
    probe_timeout: Duration,
}

impl<S> ProbeReceiver<S>
where
    S: ProbeSocket + 'static,
{
    pub(crate) fn new(
        socket: Arc<S>,
        record_rx: SendRecordReceiver,
        report_tx: ReportSender,
        identifier: u16,
        destination: Ipv4Addr,
        probe_timeout: Duration,
    ) -> Self {
        ProbeReceiver { socket, record_rx, report_tx, identifier, destination, probe_timeout }
    }

    /// Resolves every probe of the session, in ascending sequence order,
    /// each within its own time budget. Holds the capture mode for the
    /// whole loop and releases it on every exit path.
    pub(crate) fn run(self, count: u16) -> ProbeResult<Vec<ProbeReport>> {
        tracing::trace!("receiver thread start with count {}", count);
        let socket = Arc::clone(&self.socket);
        let _capture = CaptureGuard::enable(socket.as_ref())
            .map_err(|e| ProbeError::with_source("could not enable capture mode", Box::new(e)))?;
        self.resolve_all(count)
    }

    fn resolve_all(&self, count: u16) -> ProbeResult<Vec<ProbeReport>> {
        let mut send_times: HashMap<SequenceNumber, SendRecord> = HashMap::new();
        let mut sender_gone = false;
        let mut reports = Vec::with_capacity(usize::from(count));

        for sequence in SequenceNumber::session_range(count) {
            let report = self.resolve_one(sequence, &mut send_times, &mut sender_gone)?;
            if self.report_tx.send(report.clone()).is_err() {
                tracing::warn!("probe report consumer went away");
            }
            reports.push(report);
        }
        tracing::trace!("receiver thread end");
        Ok(reports)
    }

    /// Waits for the matching Echo Reply of `sequence` until the probe's
    /// time budget elapses. Unrelated or malformed datagrams are discarded
    /// without consuming more than the receive call itself.
    fn resolve_one(
        &self,
        sequence: SequenceNumber,
        send_times: &mut HashMap<SequenceNumber, SendRecord>,
        sender_gone: &mut bool,
    ) -> ProbeResult<ProbeReport> {
        let deadline = Instant::now() + self.probe_timeout;
        let mut buf = [0u8; RECV_BUFFER_LEN];

        loop {
            self.drain_records(send_times, sender_gone);
            if *sender_gone && !send_times.contains_key(&sequence) {
                // The sender aborted before this probe went out.
                tracing::debug!("probe {} was never sent, resolving as lost", sequence);
                return Ok(ProbeReport::TimedOut { sequence });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(ProbeReport::TimedOut { sequence });
            }

            let len = match self.socket.recv_frame(&mut buf, remaining) {
                Ok(Some(len)) => len,
                Ok(None) => return Ok(ProbeReport::TimedOut { sequence }),
                Err(e) => {
                    return Err(ProbeError::with_source(
                        "fatal error receiving on probing socket",
                        Box::new(e),
                    ))
                }
            };

            let datagram = match decode_datagram(&buf[..len]) {
                Ok(datagram) => datagram,
                Err(e) => {
                    tracing::trace!("discarding undecodable frame: {}", e);
                    continue;
                }
            };
            if !self.belongs_to_session(&datagram) {
                continue;
            }
            if !datagram.icmp.matches_sequence(sequence) {
                tracing::trace!("discarding session reply for another sequence");
                continue;
            }

            self.drain_records(send_times, sender_gone);
            // Removing the record makes the correlation idempotent: a
            // duplicate reply can never re-match this sequence.
            let Some(record) = send_times.remove(&sequence) else {
                tracing::trace!("no send record for sequence {}", sequence);
                continue;
            };
            let rtt = record.send_time.elapsed();
            return Ok(ProbeReport::Matched {
                payload_size: datagram.payload_size(),
                source: datagram.ip.source,
                ttl: Ttl(datagram.ip.ttl),
                sequence,
                rtt,
            });
        }
    }

    fn belongs_to_session(&self, datagram: &InboundDatagram) -> bool {
        if datagram.ip.source != self.destination {
            tracing::trace!("discarding frame from unrelated source {}", datagram.ip.source);
            return false;
        }
        if !datagram.icmp.is_echo_reply() {
            tracing::trace!("discarding non-echo-reply type {}", datagram.icmp.icmp_type);
            return false;
        }
        if !datagram.icmp.matches_identifier(self.identifier) {
            tracing::trace!("discarding reply for another session");
            return false;
        }
        true
    }

    fn drain_records(
        &self,
        send_times: &mut HashMap<SequenceNumber, SendRecord>,
        sender_gone: &mut bool,
    ) {
        loop {
            match self.record_rx.try_recv() {
                Ok(record) => {
                    send_times.insert(record.sequence, record);
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    *sender_gone = true;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::send_record_channel;
    use crate::report::report_channel;
    use crate::socket::tests::{echo_reply_frame, OnSend, SocketMock};

    const IDENTIFIER: u16 = 0xABCD;

    fn destination() -> Ipv4Addr {
        Ipv4Addr::new(192, 0, 2, 1)
    }

    fn make_receiver(
        socket: SocketMock,
        record_rx: SendRecordReceiver,
        probe_timeout: Duration,
    ) -> (ProbeReceiver<SocketMock>, crate::report::ReportReceiver) {
        let (report_tx, report_rx) = report_channel(8);
        let receiver = ProbeReceiver::new(
            Arc::new(socket),
            record_rx,
            report_tx,
            IDENTIFIER,
            destination(),
            probe_timeout,
        );
        (receiver, report_rx)
    }

    fn record_for(sequence: u16) -> SendRecord {
        SendRecord {
            sequence: SequenceNumber(sequence),
            payload_size: 48,
            send_time: Instant::now(),
        }
    }

    #[test]
    fn matches_reply_and_computes_rtt() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        socket.queue_reply(echo_reply_frame(destination(), 57, IDENTIFIER, 1, &[0; 48]));
        let (record_tx, record_rx) = send_record_channel(8);
        let (receiver, report_rx) = make_receiver(socket.clone(), record_rx, Duration::from_millis(100));

        record_tx.send(record_for(1)).unwrap();
        drop(record_tx);
        let reports = receiver.run(1).unwrap();

        assert_eq!(1, reports.len());
        let ProbeReport::Matched { payload_size, source, ttl, sequence, rtt: _ } = &reports[0]
        else {
            panic!("expected a matched probe");
        };
        assert_eq!(48, *payload_size);
        assert_eq!(destination(), *source);
        assert_eq!(Ttl(57), *ttl);
        assert_eq!(SequenceNumber(1), *sequence);
        assert_eq!(reports[0], report_rx.try_recv().unwrap());
        // Capture mode was held for the loop and released.
        assert_eq!(vec![true, false], socket.capture_log());
    }

    #[test]
    fn reply_with_foreign_identifier_is_never_matched() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        socket.queue_reply(echo_reply_frame(destination(), 57, 0x1111, 1, &[0; 8]));
        let (record_tx, record_rx) = send_record_channel(8);
        let (receiver, _report_rx) = make_receiver(socket, record_rx, Duration::from_millis(20));

        record_tx.send(record_for(1)).unwrap();
        drop(record_tx);
        let reports = receiver.run(1).unwrap();

        assert_eq!(vec![ProbeReport::TimedOut { sequence: SequenceNumber(1) }], reports);
    }

    #[test]
    fn reply_from_unrelated_source_is_discarded() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        socket.queue_reply(echo_reply_frame(Ipv4Addr::new(10, 9, 8, 7), 57, IDENTIFIER, 1, &[0; 8]));
        let (record_tx, record_rx) = send_record_channel(8);
        let (receiver, _report_rx) = make_receiver(socket, record_rx, Duration::from_millis(20));

        record_tx.send(record_for(1)).unwrap();
        drop(record_tx);
        let reports = receiver.run(1).unwrap();

        assert_eq!(vec![ProbeReport::TimedOut { sequence: SequenceNumber(1) }], reports);
    }

    #[test]
    fn malformed_frame_does_not_terminate_the_loop() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        socket.queue_reply(vec![0x45, 0x00, 0x00]); // too short for any header
        socket.queue_reply(echo_reply_frame(destination(), 64, IDENTIFIER, 1, &[0; 8]));
        let (record_tx, record_rx) = send_record_channel(8);
        let (receiver, _report_rx) = make_receiver(socket, record_rx, Duration::from_millis(100));

        record_tx.send(record_for(1)).unwrap();
        drop(record_tx);
        let reports = receiver.run(1).unwrap();

        assert!(matches!(reports[0], ProbeReport::Matched { .. }));
    }

    #[test]
    fn duplicate_reply_is_not_rematched() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        let frame = echo_reply_frame(destination(), 64, IDENTIFIER, 1, &[0; 8]);
        socket.queue_reply(frame.clone());
        socket.queue_reply(frame);
        let (record_tx, record_rx) = send_record_channel(8);
        let (receiver, _report_rx) = make_receiver(socket, record_rx, Duration::from_millis(20));

        record_tx.send(record_for(1)).unwrap();
        record_tx.send(record_for(2)).unwrap();
        drop(record_tx);
        let reports = receiver.run(2).unwrap();

        assert!(matches!(reports[0], ProbeReport::Matched { sequence: SequenceNumber(1), .. }));
        // The duplicate of sequence 1 must not resolve probe 2.
        assert_eq!(ProbeReport::TimedOut { sequence: SequenceNumber(2) }, reports[1]);
    }

    #[test]
    fn out_of_order_replies_resolve_in_sequence_order() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        // Sequence 2 arrives first; it is discarded while probe 1 is
        // awaited, then probe 1 matches and probe 2 times out.
        socket.queue_reply(echo_reply_frame(destination(), 64, IDENTIFIER, 2, &[0; 8]));
        socket.queue_reply(echo_reply_frame(destination(), 64, IDENTIFIER, 1, &[0; 8]));
        let (record_tx, record_rx) = send_record_channel(8);
        let (receiver, _report_rx) = make_receiver(socket, record_rx, Duration::from_millis(20));

        record_tx.send(record_for(1)).unwrap();
        record_tx.send(record_for(2)).unwrap();
        drop(record_tx);
        let reports = receiver.run(2).unwrap();

        assert!(matches!(reports[0], ProbeReport::Matched { sequence: SequenceNumber(1), .. }));
        assert_eq!(ProbeReport::TimedOut { sequence: SequenceNumber(2) }, reports[1]);
    }

    #[test]
    fn aborted_sender_resolves_unsent_probes_without_waiting() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        let (record_tx, record_rx) = send_record_channel(8);
        // Sender died after probe 1; probes 2 and 3 were never sent.
        record_tx.send(record_for(1)).unwrap();
        drop(record_tx);
        let (receiver, _report_rx) = make_receiver(socket, record_rx, Duration::from_millis(10));

        let started = Instant::now();
        let reports = receiver.run(3).unwrap();

        assert_eq!(3, reports.len());
        assert!(reports.iter().all(|r| matches!(r, ProbeReport::TimedOut { .. })));
        // Only probe 1 waits out its budget.
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
