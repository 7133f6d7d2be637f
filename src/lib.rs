#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // TODO

//! An ICMPv4 echo probing engine.
//!
//! A [`Session`] sends `n` Echo Request probes to one destination from a
//! sender thread while a receiver thread correlates the replies strictly
//! by sequence number, each probe within its own time budget. After both
//! threads are joined the resolved probes reduce to a [`SessionResult`].

pub use checksum::internet_checksum;
pub use decode::{decode_datagram, DecodeError, IcmpHeader, InboundDatagram, Ipv4Header};
pub use error::{GenericError, ProbeError, ProbeResult};
pub use packet::{build_echo_request, default_payload, DEFAULT_PAYLOAD_SIZE};
pub use probe::{SequenceNumber, Ttl};
pub use report::ProbeReport;
pub use session::{Session, SessionConfig, SessionHandle};
pub use socket::{CaptureGuard, ProbeSocket, RawSocket};
pub use stats::{PingRecord, RttStats, SessionResult};

mod checksum;
mod decode;
mod error;
mod packet;
mod probe;
mod receiver;
mod records;
mod report;
mod sender;
mod session;
mod socket;
mod stats;
