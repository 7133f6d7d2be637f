//! The send-timestamp records flowing from sender to receiver.
//!
//! A bounded mpsc channel carries one record per transmitted probe; the
//! receiver drains it into a sequence-keyed map. This is the only shared
//! mutable state between the two threads.

use crate::probe::SequenceNumber;
use std::sync::mpsc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SendRecord {
    pub sequence: SequenceNumber,
    pub payload_size: usize,
    pub send_time: Instant,
}

pub(crate) type SendRecordSender = mpsc::SyncSender<SendRecord>;
pub(crate) type SendRecordReceiver = mpsc::Receiver<SendRecord>;

pub(crate) fn send_record_channel(channel_size: usize) -> (SendRecordSender, SendRecordReceiver) {
    mpsc::sync_channel::<SendRecord>(channel_size)
}
