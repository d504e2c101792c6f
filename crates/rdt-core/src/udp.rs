//! Datagram transport over a tokio `UdpSocket`.
//!
//! The socket and the peer address belong to one flow. A sending endpoint
//! talks to a fixed peer; a receiving endpoint replies to whoever sent it the
//! last datagram.
//!
//! A receiver bound to the unspecified address answers from whichever local
//! address the kernel picks, which need not be the one the sender resolved.
//! Replies are therefore matched on the peer's port only.

use bytes::Bytes;
use rdt_abstract::{MAX_FRAME, Transport};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{UdpSocket, lookup_host};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerMode {
    /// Only datagrams from the configured peer's port are accepted.
    Fixed,
    /// The peer is whoever sent the most recent datagram.
    Learned,
}

#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    mode: PeerMode,
    buf: Box<[u8]>,
}

impl UdpTransport {
    /// Resolve `host:port` and bind an ephemeral local port of the same family.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let peer = lookup_host((host, port)).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {host}"),
            )
        })?;
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        debug!("udp socket {} talking to {}", socket.local_addr()?, peer);
        Ok(Self::new(socket, Some(peer), PeerMode::Fixed))
    }

    /// Listen on `port` on all IPv4 interfaces.
    pub async fn bind(port: u16) -> io::Result<Self> {
        Self::bind_addr((Ipv4Addr::UNSPECIFIED, port).into()).await
    }

    pub async fn bind_addr(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        debug!("udp socket listening on {}", socket.local_addr()?);
        Ok(Self::new(socket, None, PeerMode::Learned))
    }

    fn new(socket: UdpSocket, peer: Option<SocketAddr>, mode: PeerMode) -> Self {
        Self {
            socket,
            peer,
            mode,
            buf: vec![0u8; MAX_FRAME].into_boxed_slice(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl Transport for UdpTransport {
    async fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()> {
        let peer = self.peer.ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no peer to send to yet")
        })?;
        self.socket.send_to(datagram, peer).await?;
        Ok(())
    }

    async fn recv_datagram(&mut self) -> io::Result<Bytes> {
        loop {
            let (n, from) = self.socket.recv_from(&mut self.buf).await?;
            match self.mode {
                PeerMode::Learned => self.peer = Some(from),
                PeerMode::Fixed if self.peer.map(|p| p.port()) != Some(from.port()) => {
                    debug!("ignoring datagram from unexpected port {}", from);
                    continue;
                }
                PeerMode::Fixed => {}
            }
            return Ok(Bytes::copy_from_slice(&self.buf[..n]));
        }
    }
}
