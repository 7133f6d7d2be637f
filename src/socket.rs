//! The raw-socket seam of the probing engine.

use socket2::{Domain, Protocol, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// The operations the sender and receiver need from a socket. Both threads
/// share one implementor; the operating system allows concurrent send and
/// receive on the same raw socket, so no locking happens at this seam.
pub trait ProbeSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize>;

    /// Waits up to `timeout` for one inbound frame.
    ///
    /// Returns `Ok(Some(len))` with the frame copied into `buf`,
    /// `Ok(None)` when the timeout elapsed without a frame, and `Err` on
    /// any other socket failure.
    fn recv_frame(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;

    /// Toggles the platform's receive-all capture mode. A no-op where the
    /// kernel already delivers ICMP traffic to raw sockets.
    fn set_capture_all(&self, enabled: bool) -> io::Result<()>;
}

/// A raw ICMPv4 socket. Requires elevated privilege to create.
pub struct RawSocket {
    socket: socket2::Socket,
}

impl RawSocket {
    pub fn new(source: Option<Ipv4Addr>) -> io::Result<RawSocket> {
        tracing::trace!("creating raw ICMPv4 socket");
        let socket = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        if let Some(source) = source {
            let addr = SocketAddr::V4(SocketAddrV4::new(source, 0));
            socket.bind(&addr.into())?;
            tracing::debug!("bound probing socket to {}", source);
        }
        Ok(RawSocket { socket })
    }
}

impl ProbeSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, &(*addr).into())
    }

    fn recv_frame(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        if timeout.is_zero() {
            return Ok(None);
        }
        self.socket.set_read_timeout(Some(timeout))?;

        // Socket2 gives a safety guaranty which allows us to do an unsafe
        // cast from `&mut [u8]` to `&mut [std::mem::MaybeUninit<u8>]`.
        // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
        //
        // On a RAW socket we get a full IP frame.
        let recv_result = self.socket.recv_from(unsafe {
            &mut *(std::ptr::addr_of_mut!(*buf) as *mut [std::mem::MaybeUninit<u8>])
        });
        match recv_result {
            Ok((len, _addr)) => Ok(Some(len)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn set_capture_all(&self, _enabled: bool) -> io::Result<()> {
        // On Unix the kernel hands raw ICMPv4 sockets all matching traffic.
        // A Windows port would issue SIO_RCVALL here.
        Ok(())
    }
}

/// Scoped acquisition of the receive-all capture mode: enabled on
/// construction, released on drop, on every exit path.
pub struct CaptureGuard<'a, S: ProbeSocket + ?Sized> {
    socket: &'a S,
}

impl<'a, S: ProbeSocket + ?Sized> CaptureGuard<'a, S> {
    pub fn enable(socket: &'a S) -> io::Result<CaptureGuard<'a, S>> {
        socket.set_capture_all(true)?;
        Ok(CaptureGuard { socket })
    }
}

impl<S: ProbeSocket + ?Sized> Drop for CaptureGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.socket.set_capture_all(false) {
            tracing::warn!("could not release capture mode: {}", e);
        }
    }
}
