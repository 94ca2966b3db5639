//! GBN session: one protocol entity running as a background task.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │  send(chunk) / close()            recv()
//!      ▼                                     ▲
//!  ┌─────────────┐                     ┌─────────────┐
//!  │ down queue  │  capacity 1         │  up queue   │  capacity 1
//!  └──────┬──────┘                     └──────▲──────┘
//!         │ event loop task                   │ event loop task
//!     GbnSender                          GbnReceiver
//!         │                                   ▲
//!         ▼                                   │
//!   ChannelSimulator ── Transport ── … ── ChannelSimulator
//! ```
//!
//! A session runs exactly one role.  The sending session pulls chunks off
//! its down queue only while the window has room, so a full window stalls
//! `send()` callers (backpressure).  The receiving session pushes in-order
//! chunks into its up queue; the application drains it with `recv()`.
//!
//! # Event priority
//!
//! Each loop iteration waits, in strict priority order, for
//! 1. an arriving frame,
//! 2. the earliest armed timer,
//! 3. (sender only, window permitting) an application chunk.
//!
//! so pending ACK processing is never starved by fresh application data.
//!
//! # Usage
//!
//! ```ignore
//! let mut tx = GbnSession::open("localhost", 16, Role::Sender).await?;
//! tx.send(b"hello\n".to_vec()).await?;
//! tx.close().await?;
//! let stats = tx.join().await?;
//! ```

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::error::{GbnError, Result};
use crate::gbn_receiver::{GbnReceiver, ReceiverEvent};
use crate::gbn_sender::{GbnSender, SenderEvent};
use crate::packet::MAX_PAYLOAD;
use crate::seq::HALF;
use crate::simulator::{ChannelSimulator, SimulatorConfig, Statistics};
use crate::socket::UdpTransport;
use crate::state::Role;
use crate::timer::{TimerConfig, TimerKind};
use crate::transport::Transport;

/// UDP port the sending entity binds.
pub const SENDER_PORT: u16 = 9977;
/// UDP port the receiving entity binds.
pub const RECEIVER_PORT: u16 = 9988;

/// Sleep target used while no timer is armed (the branch is disabled then).
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 3600);

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Everything a session needs, fixed at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Window size N, in `1..HALF`.
    pub window_size: usize,
    pub simulator: SimulatorConfig,
    pub timers: TimerConfig,
    /// Stop after this many consecutive fruitless retransmissions.
    /// `None` retries forever.
    pub max_retransmits: Option<u32>,
    pub sender_port: u16,
    pub receiver_port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: 16,
            simulator: SimulatorConfig::default(),
            timers: TimerConfig::default(),
            max_retransmits: None,
            sender_port: SENDER_PORT,
            receiver_port: RECEIVER_PORT,
        }
    }
}

impl SessionConfig {
    pub fn with_window(window_size: usize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    /// Use `simulator`, stretching the retransmit interval to cover its
    /// extra delay.
    pub fn simulator(mut self, simulator: SimulatorConfig) -> Self {
        self.timers = TimerConfig::for_delay(simulator.extra_mean_delay);
        self.simulator = simulator;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..HALF).contains(&self.window_size) {
            return Err(GbnError::InvalidWindow(self.window_size));
        }
        self.simulator.validate()
    }

    /// `(local, peer)` ports for `role`.
    fn ports(&self, role: Role) -> (u16, u16) {
        match role {
            Role::Sender => (self.sender_port, self.receiver_port),
            Role::Receiver => (self.receiver_port, self.sender_port),
        }
    }
}

// ---------------------------------------------------------------------------
// GbnSession
// ---------------------------------------------------------------------------

/// Handle to one running protocol entity.
pub struct GbnSession {
    role: Role,
    /// Application → engine.  `None` once `close` has run.
    down_tx: Option<mpsc::Sender<Vec<u8>>>,
    /// Engine → application.
    up_rx: Option<mpsc::Receiver<Vec<u8>>>,
    eof: bool,
    handle: JoinHandle<Result<Statistics>>,
}

impl GbnSession {
    /// Open a session with `peer_host` over UDP using default settings.
    pub async fn open(peer_host: &str, window_size: usize, role: Role) -> Result<Self> {
        Self::open_with_config(peer_host, role, SessionConfig::with_window(window_size)).await
    }

    /// Bind this role's port, connect to the peer role's port on
    /// `peer_host`, and start the engine.
    pub async fn open_with_config(
        peer_host: &str,
        role: Role,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (local_port, peer_port) = config.ports(role);

        let peer = tokio::net::lookup_host((peer_host, peer_port))
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {peer_host}"),
                )
            })?;
        let local = match peer {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, local_port)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, local_port)),
        };

        let transport = UdpTransport::bind(local).await?;
        transport.connect(peer).await?;
        log::info!("[gbn] {role} bound {} → {peer}", transport.local_addr);

        Self::with_transport(transport, role, config)
    }

    /// Start an engine over an already-connected transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_transport<T>(transport: T, role: Role, config: SessionConfig) -> Result<Self>
    where
        T: Transport + 'static,
    {
        config.validate()?;
        let channel = ChannelSimulator::new(transport, config.simulator.clone());

        let session = match role {
            Role::Sender => {
                let (down_tx, down_rx) = mpsc::channel(1);
                let engine = GbnSender::new(config.window_size, config.timers.clone())
                    .with_max_retransmits(config.max_retransmits);
                GbnSession {
                    role,
                    down_tx: Some(down_tx),
                    up_rx: None,
                    eof: false,
                    handle: tokio::spawn(run_sender(engine, channel, down_rx)),
                }
            }
            Role::Receiver => {
                let (up_tx, up_rx) = mpsc::channel(1);
                let engine = GbnReceiver::new(config.window_size, config.timers.clone());
                GbnSession {
                    role,
                    down_tx: None,
                    up_rx: Some(up_rx),
                    eof: false,
                    handle: tokio::spawn(run_receiver(engine, channel, up_tx)),
                }
            }
        };
        log::info!("[gbn] app {role} starts");
        Ok(session)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// `true` once the engine task has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Hand one chunk to the sending engine.
    ///
    /// Waits until the previous chunk has been taken by the engine, which in
    /// turn only happens while the send window has room.  Empty chunks are
    /// ignored; use [`close`](Self::close) to end the stream.  Chunks longer
    /// than [`MAX_PAYLOAD`] are rejected with [`GbnError::ChunkTooLarge`].
    pub async fn send(&self, chunk: impl Into<Vec<u8>>) -> Result<()> {
        if self.role != Role::Sender {
            return Err(GbnError::WrongRole);
        }
        let tx = self.down_tx.as_ref().ok_or(GbnError::SessionClosed)?;
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(());
        }
        if chunk.len() > MAX_PAYLOAD {
            return Err(GbnError::ChunkTooLarge(chunk.len()));
        }
        log::debug!("[gbn] send: {} bytes", chunk.len());
        tx.send(chunk).await.map_err(|_| GbnError::EngineStopped)
    }

    /// Signal end of stream and wait until the engine has taken the signal.
    ///
    /// Does not wait for the FIN to be acknowledged; use
    /// [`join`](Self::join) for that.  Calling `close` again is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.role != Role::Sender {
            return Err(GbnError::WrongRole);
        }
        let Some(tx) = self.down_tx.take() else {
            return Ok(());
        };
        tx.send(Vec::new())
            .await
            .map_err(|_| GbnError::EngineStopped)?;
        // The single slot frees up exactly when the engine takes the
        // sentinel.  An error means the engine is already gone.
        if let Ok(permit) = tx.reserve().await {
            drop(permit);
        }
        log::info!("[gbn] app terminates");
        Ok(())
    }

    /// Next in-order chunk, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        if self.eof {
            return Ok(None);
        }
        let rx = match (self.role, self.up_rx.as_mut()) {
            (Role::Receiver, Some(rx)) => rx,
            _ => return Err(GbnError::WrongRole),
        };
        match rx.recv().await {
            Some(chunk) if chunk.is_empty() => {
                self.eof = true;
                Ok(None)
            }
            Some(chunk) => Ok(Some(chunk)),
            None => Err(GbnError::EngineStopped),
        }
    }

    /// Wait for the engine to reach `Closed` and return its statistics.
    ///
    /// A sending session that was never closed ends its stream here.
    pub async fn join(self) -> Result<Statistics> {
        let GbnSession {
            down_tx,
            up_rx,
            handle,
            ..
        } = self;
        drop(down_tx);
        drop(up_rx);
        handle.await.map_err(|e| GbnError::Join(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Event loops
// ---------------------------------------------------------------------------

async fn run_sender<T: Transport>(
    mut engine: GbnSender,
    mut channel: ChannelSimulator<T>,
    mut app_rx: mpsc::Receiver<Vec<u8>>,
) -> Result<Statistics> {
    log::info!("[gbn] {} starts", Role::Sender);
    let started = Instant::now();
    let result = sender_loop(&mut engine, &mut channel, &mut app_rx).await;
    channel.set_elapsed(started.elapsed());
    report(Role::Sender, engine.window_size(), channel, result)
}

async fn sender_loop<T: Transport>(
    engine: &mut GbnSender,
    channel: &mut ChannelSimulator<T>,
    app_rx: &mut mpsc::Receiver<Vec<u8>>,
) -> Result<()> {
    while !engine.is_closed() {
        let deadline = engine.next_deadline();

        let event = tokio::select! {
            biased;

            // ── 1: frame from the peer ──────────────────────────────────
            pkt = channel.receive() => SenderEvent::PacketArrival(pkt?),

            // ── 2: timer ────────────────────────────────────────────────
            _ = sleep_until(deadline.unwrap_or_else(far_future)), if deadline.is_some() => {
                match engine.poll_timeout() {
                    Some(TimerKind::Retransmit) => SenderEvent::RetransmitTimeout,
                    Some(other) => {
                        log::warn!("[gbn:send] unknown timer {other:?}; ignored");
                        continue;
                    }
                    None => continue,
                }
            }

            // ── 3: application chunk, only while the window has room ──
            chunk = app_rx.recv(), if engine.can_accept() => {
                // A dropped session handle ends the stream like close().
                SenderEvent::AppRequest(chunk.unwrap_or_default())
            }
        };

        for pkt in engine.handle(event)? {
            channel.transmit(&pkt).await?;
        }
    }
    Ok(())
}

async fn run_receiver<T: Transport>(
    mut engine: GbnReceiver,
    mut channel: ChannelSimulator<T>,
    app_tx: mpsc::Sender<Vec<u8>>,
) -> Result<Statistics> {
    log::info!("[gbn] {} starts", Role::Receiver);
    let result = receiver_loop(&mut engine, &mut channel, &app_tx).await;
    channel.set_elapsed(engine.elapsed());
    report(Role::Receiver, engine.window_size(), channel, result)
}

async fn receiver_loop<T: Transport>(
    engine: &mut GbnReceiver,
    channel: &mut ChannelSimulator<T>,
    app_tx: &mpsc::Sender<Vec<u8>>,
) -> Result<()> {
    while !engine.is_closed() {
        let deadline = engine.next_deadline();

        let event = tokio::select! {
            biased;

            pkt = channel.receive() => ReceiverEvent::PacketArrival(pkt?),

            _ = sleep_until(deadline.unwrap_or_else(far_future)), if deadline.is_some() => {
                match engine.poll_timeout() {
                    Some(TimerKind::ClosingLinger) => ReceiverEvent::ClosingLingerTimeout,
                    Some(other) => {
                        log::warn!("[gbn:recv] unknown timer {other:?}; ignored");
                        continue;
                    }
                    None => continue,
                }
            }
        };

        let out = engine.handle(event);
        for chunk in out.delivered {
            log::debug!("[gbn] deliver: {} bytes", chunk.len());
            if app_tx.send(chunk).await.is_err() {
                log::debug!("[gbn:recv] application stopped reading; chunk dropped");
            }
        }
        if let Some(ack) = out.ack {
            channel.transmit(&ack).await?;
        }
    }
    Ok(())
}

/// Log the outcome of an engine run and hand back its statistics.
fn report<T>(
    role: Role,
    window_size: usize,
    channel: ChannelSimulator<T>,
    result: Result<()>,
) -> Result<Statistics>
where
    T: Transport,
{
    let sim = channel.config().clone();
    let stats = channel.into_stats();
    match result {
        Ok(()) => {
            log::info!("[gbn] {role} terminates");
            log::info!(
                "*** GBN parameters *** window size: {window_size}, loss: {}, corrupt: {}, extra mean delay: {:?}",
                sim.loss_rate,
                sim.corrupt_rate,
                sim.extra_mean_delay
            );
            log::info!("*** Statistics ***\n{stats}");
            Ok(stats)
        }
        Err(e) => {
            log::error!("[gbn] {role} failed: {e}");
            Err(e)
        }
    }
}

fn far_future() -> Instant {
    Instant::now() + FAR_FUTURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.ports(Role::Sender), (SENDER_PORT, RECEIVER_PORT));
        assert_eq!(cfg.ports(Role::Receiver), (RECEIVER_PORT, SENDER_PORT));
    }

    #[test]
    fn window_must_stay_below_half_space() {
        assert!(matches!(
            SessionConfig::with_window(0).validate(),
            Err(GbnError::InvalidWindow(0))
        ));
        assert!(SessionConfig::with_window(HALF - 1).validate().is_ok());
        assert!(matches!(
            SessionConfig::with_window(HALF).validate(),
            Err(GbnError::InvalidWindow(_))
        ));
        assert!(matches!(
            SessionConfig::with_window(256).validate(),
            Err(GbnError::InvalidWindow(256))
        ));
    }

    #[test]
    fn simulator_delay_stretches_retransmit_interval() {
        let cfg = SessionConfig::default().simulator(SimulatorConfig {
            extra_mean_delay: Duration::from_millis(20),
            ..SimulatorConfig::default()
        });
        assert_eq!(cfg.timers.retransmit, Duration::from_millis(400));
    }
}
