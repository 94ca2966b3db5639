//! Connected UDP socket transport.
//!
//! [`UdpTransport`] is a thin wrapper around `tokio::net::UdpSocket`
//! connected to exactly one peer.  It speaks raw datagrams; framing lives in
//! [`crate::packet`] and impairments in [`crate::simulator`].

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::packet::MAX_DATAGRAM;
use crate::transport::Transport;

/// `true` for errors a connected UDP socket reports when the peer port is
/// not (yet, or any longer) open.  These behave like a lost datagram.
fn is_transient_io_error(e: &io::Error) -> bool {
    use io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}

#[derive(Debug)]
pub struct UdpTransport {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl UdpTransport {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Restrict the socket to `peer`: datagrams go only there and are only
    /// accepted from there.
    pub async fn connect(&self, peer: SocketAddr) -> io::Result<()> {
        self.inner.connect(peer).await
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn transmit(&self, pdu: &[u8]) -> io::Result<()> {
        match self.inner.send(pdu).await {
            Ok(_) => Ok(()),
            Err(e) if is_transient_io_error(&e) => {
                log::debug!("[udp] send failed ({e}); treating as lost");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn receive(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.inner.recv(&mut buf).await {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(e) if is_transient_io_error(&e) => {
                    log::debug!("[udp] recv error ({e}); peer not listening");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
