//! The raw datagram primitive underneath the channel simulator.
//!
//! A [`Transport`] moves whole datagrams between the two entities of a
//! session.  It is assumed to be loss-free and unordered-but-intact; all
//! impairments are added on top by [`crate::simulator::ChannelSimulator`].
//!
//! Two implementations ship with the crate:
//! - [`crate::socket::UdpTransport`] — a connected UDP socket.
//! - [`MemoryTransport`] — an in-process pair, used by tests.

use std::io;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand one datagram to the peer.
    async fn transmit(&self, pdu: &[u8]) -> io::Result<()>;

    /// Wait for the next datagram from the peer.
    ///
    /// Must be cancel-safe: the event loop drops this future whenever a
    /// timer or the application wins the race.
    async fn receive(&self) -> io::Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// One end of an in-process datagram link.
///
/// Datagrams sent after the peer end is dropped are discarded, and
/// [`receive`](Transport::receive) on an orphaned end never completes,
/// matching what a UDP socket does when the other side goes away.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryTransport {
    /// Create two connected ends.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                tx: a_tx,
                rx: Mutex::new(a_rx),
            },
            MemoryTransport {
                tx: b_tx,
                rx: Mutex::new(b_rx),
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn transmit(&self, pdu: &[u8]) -> io::Result<()> {
        if self.tx.send(pdu.to_vec()).is_err() {
            log::trace!("[mem] peer gone; datagram discarded");
        }
        Ok(())
    }

    async fn receive(&self) -> io::Result<Vec<u8>> {
        match self.rx.lock().await.recv().await {
            Some(pdu) => Ok(pdu),
            None => std::future::pending().await,
        }
    }
}
