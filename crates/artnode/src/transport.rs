//! Datagram transport behind the node core.
//!
//! The core only ever asks for two things: "send these bytes to that
//! address" and "give me one datagram with its source, or no-data,
//! within a timeout". `UdpTransport` is the real implementation;
//! `MemoryTransport` backs tests and single-process wiring.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::rc::Rc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use artnode_protocol::ARTNET_PORT;

use crate::error::{Error, Result};

pub trait Transport {
    /// Bind whatever resources receiving and sending need.
    fn open(&mut self) -> Result<()>;

    /// Release them. Safe to call on a transport that never opened.
    fn close(&mut self);

    /// Send one datagram. Returns the number of bytes written.
    fn send_to(&mut self, data: &[u8], to: Ipv4Addr) -> Result<usize>;

    /// Receive one datagram, blocking at most `timeout`. `Ok(None)`
    /// means nothing arrived; a zero timeout returns immediately.
    fn recv_from(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, Ipv4Addr)>>;

    /// Raw descriptor for select()-style readiness integration.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<std::os::fd::RawFd> {
        None
    }
}

fn not_open() -> Error {
    Error::Network(io::Error::new(
        io::ErrorKind::NotConnected,
        "transport not open",
    ))
}

/// UDP transport bound to the Art-Net port.
pub struct UdpTransport {
    bind_addr: Ipv4Addr,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(bind_addr: Ipv4Addr) -> Self {
        Self {
            bind_addr,
            socket: None,
        }
    }
}

impl Transport for UdpTransport {
    fn open(&mut self) -> Result<()> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        let addr = SocketAddrV4::new(self.bind_addr, ARTNET_PORT);
        socket.bind(&addr.into())?;
        debug!(bind = %addr, "udp transport bound");
        self.socket = Some(socket.into());
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn send_to(&mut self, data: &[u8], to: Ipv4Addr) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or_else(not_open)?;
        let n = socket.send_to(data, SocketAddrV4::new(to, ARTNET_PORT))?;
        Ok(n)
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, Ipv4Addr)>> {
        let socket = self.socket.as_ref().ok_or_else(not_open)?;
        if timeout.is_zero() {
            socket.set_nonblocking(true)?;
        } else {
            socket.set_nonblocking(false)?;
            socket.set_read_timeout(Some(timeout))?;
        }
        match socket.recv_from(buf) {
            Ok((n, SocketAddr::V4(src))) => Ok(Some((n, *src.ip()))),
            // non-IPv4 source: surface as a filtered (empty) datagram
            Ok((_, _)) => Ok(Some((0, Ipv4Addr::UNSPECIFIED))),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(Error::Network(e)),
        }
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<std::os::fd::RawFd> {
        use std::os::fd::AsRawFd;
        self.socket.as_ref().map(|s| s.as_raw_fd())
    }
}

#[derive(Default)]
struct MemoryInner {
    open: bool,
    inbound: VecDeque<(Vec<u8>, Ipv4Addr)>,
    sent: Vec<(Vec<u8>, Ipv4Addr)>,
}

/// In-memory transport. Clones share the same queues, so a handle kept
/// outside the node can inject datagrams and inspect what it sent.
/// Never blocks: an empty queue is always "no data".
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound datagram as if it arrived from `from`.
    pub fn push(&self, data: &[u8], from: Ipv4Addr) {
        self.inner
            .borrow_mut()
            .inbound
            .push_back((data.to_vec(), from));
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<(Vec<u8>, Ipv4Addr)> {
        self.inner.borrow().sent.clone()
    }

    /// Drain the send log.
    pub fn take_sent(&self) -> Vec<(Vec<u8>, Ipv4Addr)> {
        std::mem::take(&mut self.inner.borrow_mut().sent)
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().open
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self) -> Result<()> {
        self.inner.borrow_mut().open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.inner.borrow_mut().open = false;
    }

    fn send_to(&mut self, data: &[u8], to: Ipv4Addr) -> Result<usize> {
        let mut inner = self.inner.borrow_mut();
        if !inner.open {
            return Err(not_open());
        }
        inner.sent.push((data.to_vec(), to));
        Ok(data.len())
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<Option<(usize, Ipv4Addr)>> {
        let mut inner = self.inner.borrow_mut();
        if !inner.open {
            return Err(not_open());
        }
        match inner.inbound.pop_front() {
            Some((data, from)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(Some((n, from)))
            }
            None => Ok(None),
        }
    }
}
