//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] turns application chunks into a sliding window of up to `N`
//! framed, timed and retransmitted frames.
//!
//! # Protocol contract
//!
//! - At most `window_size` frames are outstanding: `next_seq - base <= N`
//!   in circular distance, at all times.
//! - ACKs are **cumulative**: an ACK for `k` confirms every frame up to and
//!   including `k`.
//! - On timeout, **all** unacknowledged frames from `base` onwards are sent
//!   again, oldest first (go back N).
//! - An empty chunk is the end-of-stream sentinel and becomes a FIN frame.
//!
//! This module only manages state; the caller owns the channel and
//! transmits the frames returned by [`GbnSender::handle`].
//!
//! # Sequence-number layout
//!
//! ```text
//!     base             next_seq         base + N
//!      │                  │                 │
//!  ────┼──────────────────┼─────────────────┼──────▶ seq space
//!      │ <── in flight ──▶│ <── sendable ──▶│
//! ```

use std::fmt;

use crate::buffer::WindowBuffer;
use crate::error::GbnError;
use crate::packet::Packet;
use crate::seq::Seq;
use crate::state::FsmState;
use crate::timer::{ExpiryTimers, TimerConfig, TimerKind};

/// Inputs to the sender FSM.
#[derive(Debug)]
pub enum SenderEvent {
    /// A frame came in from the channel (possibly corrupt).
    PacketArrival(Packet),
    /// The application handed over a chunk; empty means end of stream.
    AppRequest(Vec<u8>),
    RetransmitTimeout,
}

impl fmt::Display for SenderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderEvent::PacketArrival(pkt) if pkt.is_corrupt() => {
                write!(f, "Packet_Arrival *corrupt*")
            }
            SenderEvent::PacketArrival(pkt) => write!(f, "Packet_Arrival {pkt}"),
            SenderEvent::AppRequest(chunk) => write!(f, "App_Request len={}", chunk.len()),
            SenderEvent::RetransmitTimeout => write!(f, "TO_Retransmit"),
        }
    }
}

// ---------------------------------------------------------------------------
// GbnSender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one session.
#[derive(Debug)]
pub struct GbnSender {
    /// Oldest unacknowledged sequence number (left window edge).
    pub base: Seq,

    /// Sequence number for the **next** new frame.
    pub next_seq: Seq,

    window_size: usize,
    send_buf: WindowBuffer,
    state: FsmState,
    timers: ExpiryTimers,

    /// Optional bound on consecutive timeouts without progress.
    max_retransmits: Option<u32>,
    retransmit_rounds: u32,
}

impl GbnSender {
    /// Create a sender with window size `window_size` (N ≥ 1).
    pub fn new(window_size: usize, timers: TimerConfig) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            base: Seq::default(),
            next_seq: Seq::default(),
            window_size,
            send_buf: WindowBuffer::new(window_size),
            state: FsmState::Wait,
            timers: ExpiryTimers::new(timers),
            max_retransmits: None,
            retransmit_rounds: 0,
        }
    }

    /// Give up with [`GbnError::RetriesExhausted`] after `cap` consecutive
    /// retransmission rounds that did not move the window.
    pub fn with_max_retransmits(mut self, cap: Option<u32>) -> Self {
        self.max_retransmits = cap;
        self
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == FsmState::Closed
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of frames sent but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.base.distance(self.next_seq)
    }

    /// `true` when a new application chunk may be taken.
    ///
    /// This is the backpressure gate: while it is `false` the event loop
    /// leaves the application's chunk in its queue.
    pub fn can_accept(&self) -> bool {
        self.state == FsmState::Wait && self.in_flight() < self.window_size
    }

    pub fn timers(&self) -> &ExpiryTimers {
        &self.timers
    }

    /// Earliest armed timer deadline, for the event loop's sleep.
    pub fn next_deadline(&self) -> Option<tokio::time::Instant> {
        self.timers.next_deadline()
    }

    /// Pop the next expired timer, if any.
    pub fn poll_timeout(&mut self) -> Option<TimerKind> {
        self.timers.poll_expired()
    }

    /// Feed one event through the FSM.
    ///
    /// Returns the frames to hand to the channel, in transmission order.
    pub fn handle(&mut self, event: SenderEvent) -> Result<Vec<Packet>, GbnError> {
        log::debug!("{} {}:{} {}", self.state, self.base, self.next_seq, event);

        match (self.state, event) {
            (FsmState::Wait, SenderEvent::AppRequest(chunk)) => Ok(vec![self.send_packet(chunk)]),
            (FsmState::Wait, SenderEvent::PacketArrival(pkt)) => {
                self.handle_ack(&pkt);
                Ok(Vec::new())
            }
            (FsmState::Wait | FsmState::Closing, SenderEvent::RetransmitTimeout) => {
                self.retransmit()
            }
            (FsmState::Closing, SenderEvent::PacketArrival(pkt)) => {
                self.handle_ack(&pkt);
                if self.base == self.next_seq {
                    self.state = FsmState::Closed;
                    log::debug!("{} {}:{}", self.state, self.base, self.next_seq);
                }
                Ok(Vec::new())
            }
            (state, event) => {
                log::warn!("[gbn:send] unexpected {event} in state {state}; ignored");
                Ok(Vec::new())
            }
        }
    }

    /// Frame `chunk` at `next_seq`, buffer it and return it for sending.
    fn send_packet(&mut self, chunk: Vec<u8>) -> Packet {
        debug_assert!(self.can_accept(), "window full ({}/{})", self.in_flight(), self.window_size);

        let seq = self.next_seq;
        let is_fin = chunk.is_empty();
        let pkt = if is_fin {
            Packet::fin(seq)
        } else {
            Packet::data(seq, chunk)
        };
        self.send_buf.set(seq, pkt.clone());

        if self.base == self.next_seq {
            self.timers.start(TimerKind::Retransmit);
        }
        self.next_seq += 1;

        if is_fin {
            self.state = FsmState::Closing;
        }
        pkt
    }

    /// Apply a cumulative ACK.  Returns `true` when the window slid.
    fn handle_ack(&mut self, pkt: &Packet) -> bool {
        if pkt.is_corrupt() || !pkt.is_ack() {
            return false;
        }
        let ack = pkt.seq;
        // Only ACKs in [base, next_seq) acknowledge anything new.
        if self.base.distance(ack) >= self.in_flight() {
            log::trace!("[gbn:send] stale ACK {ack} (base {})", self.base);
            return false;
        }

        for seq in Seq::range(self.base, ack + 1) {
            self.send_buf.clear(seq);
        }
        self.base = ack + 1;
        self.retransmit_rounds = 0;

        if self.base == self.next_seq {
            self.timers.stop(TimerKind::Retransmit);
        } else {
            self.timers.start(TimerKind::Retransmit);
        }
        true
    }

    /// Every buffered frame in `[base, next_seq)`, oldest first.
    fn retransmit(&mut self) -> Result<Vec<Packet>, GbnError> {
        if let Some(cap) = self.max_retransmits {
            self.retransmit_rounds += 1;
            if self.retransmit_rounds > cap {
                return Err(GbnError::RetriesExhausted(cap));
            }
        }

        let pkts: Vec<Packet> = Seq::range(self.base, self.next_seq)
            .filter_map(|seq| self.send_buf.get(seq).cloned())
            .collect();
        log::debug!("[gbn:send] timeout, retransmitting {} frame(s)", pkts.len());

        if !pkts.is_empty() {
            self.timers.start(TimerKind::Retransmit);
        }
        Ok(pkts)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
