//! The sending half of a probing session.

use crate::error::{ProbeError, ProbeResult};
use crate::packet::build_echo_request;
use crate::probe::SequenceNumber;
use crate::records::{SendRecord, SendRecordSender};
use crate::socket::ProbeSocket;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) struct ProbeSender<S> {
    socket: Arc<S>,
    record_tx: SendRecordSender,
    identifier: u16,
    destination: Ipv4Addr,
    interval: Duration,
    payload: Vec<u8>,
}

/// What the sender thread hands back on join. A failure aborts the
/// remaining probes but the tally of what actually went out survives.
pub(crate) struct SendTally {
    pub transmitted: u16,
    pub failure: Option<ProbeError>,
}

impl<S> ProbeSender<S>
where
    S: ProbeSocket + 'static,
{
    pub(crate) fn new(
        socket: Arc<S>,
        record_tx: SendRecordSender,
        identifier: u16,
        destination: Ipv4Addr,
        interval: Duration,
        payload: Vec<u8>,
    ) -> Self {
        ProbeSender { socket, record_tx, identifier, destination, interval, payload }
    }

    /// Emits one Echo Request per sequence number at a fixed cadence. The
    /// sender never reads replies; its only side effect visible to the
    /// receiver is the stream of send records.
    pub(crate) fn run(self, count: u16) -> SendTally {
        tracing::trace!("sender thread start with count {}", count);
        let mut transmitted = 0;
        for sequence in SequenceNumber::session_range(count) {
            if let Err(failure) = self.send_one(sequence) {
                tracing::error!("error sending probe {}: {}", sequence, failure);
                return SendTally { transmitted, failure: Some(failure) };
            }
            transmitted += 1;
            if u16::from(sequence) < count {
                std::thread::sleep(self.interval);
            }
        }
        tracing::trace!("sender thread end");
        SendTally { transmitted, failure: None }
    }

    fn send_one(&self, sequence: SequenceNumber) -> ProbeResult<()> {
        let datagram = build_echo_request(self.identifier, sequence.into(), &self.payload);
        let addr = SocketAddr::new(IpAddr::V4(self.destination), 0);

        // Record before transmitting so the receiver can never observe a
        // reply whose record is still missing.
        self.record_tx
            .send(SendRecord {
                sequence,
                payload_size: self.payload.len(),
                send_time: Instant::now(),
            })
            .map_err(|e| ProbeError::with_source("send-record channel closed", Box::new(e)))?;

        self.socket.send_to(&datagram, &addr)?;
        tracing::debug!("sent echo request seq {} to {}", sequence, self.destination);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::send_record_channel;
    use crate::socket::tests::{OnSend, SocketMock};
    use std::sync::mpsc;

    fn make_sender(socket: SocketMock, record_tx: SendRecordSender) -> ProbeSender<SocketMock> {
        ProbeSender::new(
            Arc::new(socket),
            record_tx,
            0xABCD,
            Ipv4Addr::new(127, 0, 0, 1),
            Duration::from_millis(1),
            vec![0x55; 16],
        )
    }

    #[test]
    fn sends_sequences_in_order() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        let (record_tx, record_rx) = send_record_channel(8);
        let sender = make_sender(socket.clone(), record_tx);

        let tally = sender.run(3);

        assert_eq!(3, tally.transmitted);
        assert!(tally.failure.is_none());
        socket.should_send_number_of_messages(3).should_send_to_address(&SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            0,
        ));
        let sequences: Vec<u16> =
            record_rx.try_iter().map(|record| record.sequence.into()).collect();
        assert_eq!(vec![1, 2, 3], sequences);
    }

    #[test]
    fn records_carry_payload_size() {
        let socket = SocketMock::new(OnSend::ReturnDefault);
        let (record_tx, record_rx) = send_record_channel(8);
        let sender = make_sender(socket, record_tx);

        sender.run(1);

        let record = record_rx.try_recv().unwrap();
        assert_eq!(16, record.payload_size);
    }

    #[test]
    fn when_socket_fails_then_sending_aborts() {
        let socket = SocketMock::new(OnSend::ReturnErr);
        let (record_tx, record_rx) = send_record_channel(8);
        let sender = make_sender(socket, record_tx);

        let tally = sender.run(3);

        assert_eq!(0, tally.transmitted);
        assert!(tally.failure.is_some());
        // The record of the failed send was already published; nothing follows.
        assert!(record_rx.try_recv().is_ok());
        assert_eq!(Err(mpsc::TryRecvError::Disconnected), record_rx.try_recv());
    }
}
