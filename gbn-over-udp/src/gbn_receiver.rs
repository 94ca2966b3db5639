//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] turns arriving frames into an in-order delivery stream:
//!
//! - Frames inside the acceptance window `[base, base + N)` are buffered,
//!   duplicates included (storing twice is harmless).
//! - Whenever the slot at `base` is filled, payloads are delivered in order
//!   and `base` advances.
//! - Corrupt and out-of-window frames are **discarded**.
//! - After **every** arrival, accepted or not, a cumulative ACK for
//!   `base - 1` goes back.  Duplicate ACKs are how the sender learns about
//!   gaps, so they are never suppressed.
//!
//! After FIN is delivered the receiver lingers in `Closing`, re-acknowledging
//! anything that arrives in case the sender missed the final ACK, until the
//! ClosingLinger timer expires.
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.

use std::fmt;

use tokio::time::Instant;

use crate::buffer::WindowBuffer;
use crate::packet::{Kind, Packet};
use crate::seq::Seq;
use crate::state::FsmState;
use crate::timer::{ExpiryTimers, TimerConfig, TimerKind};

/// Inputs to the receiver FSM.
#[derive(Debug)]
pub enum ReceiverEvent {
    PacketArrival(Packet),
    ClosingLingerTimeout,
}

impl fmt::Display for ReceiverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverEvent::PacketArrival(pkt) if pkt.is_corrupt() => {
                write!(f, "Packet_Arrival *corrupt*")
            }
            ReceiverEvent::PacketArrival(pkt) => write!(f, "Packet_Arrival {pkt}"),
            ReceiverEvent::ClosingLingerTimeout => write!(f, "TO_Closing"),
        }
    }
}

/// What one event produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReceiverOutput {
    /// Chunks for the application, in order.  FIN shows up as an empty
    /// chunk, the end-of-stream sentinel.
    pub delivered: Vec<Vec<u8>>,
    /// Acknowledgement to transmit, if any.
    pub ack: Option<Packet>,
}

// ---------------------------------------------------------------------------
// GbnReceiver
// ---------------------------------------------------------------------------

/// Go-Back-N receive-side state for one session.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next expected in-order sequence number.
    pub base: Seq,

    window_size: usize,
    recv_buf: WindowBuffer,
    state: FsmState,
    timers: ExpiryTimers,
    fin_delivered: bool,

    /// Instant of the first event, for the elapsed-time statistic.
    started: Option<Instant>,
}

impl GbnReceiver {
    pub fn new(window_size: usize, timers: TimerConfig) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            base: Seq::default(),
            window_size,
            recv_buf: WindowBuffer::new(window_size),
            state: FsmState::Wait,
            timers: ExpiryTimers::new(timers),
            fin_delivered: false,
            started: None,
        }
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == FsmState::Closed
    }

    pub fn fin_delivered(&self) -> bool {
        self.fin_delivered
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Frames held ahead of a gap.
    pub fn buffered(&self) -> usize {
        self.recv_buf.occupied()
    }

    pub fn timers(&self) -> &ExpiryTimers {
        &self.timers
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn poll_timeout(&mut self) -> Option<TimerKind> {
        self.timers.poll_expired()
    }

    /// Time from the first event until now (or until nothing has happened).
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// `true` when `seq` lies in `[base, base + N)`.
    pub fn in_window(&self, seq: Seq) -> bool {
        self.base.distance(seq) < self.window_size
    }

    /// Feed one event through the FSM.
    pub fn handle(&mut self, event: ReceiverEvent) -> ReceiverOutput {
        log::debug!(
            "{} {}:{} {}",
            self.state,
            self.base,
            self.base + self.window_size,
            event
        );
        self.started.get_or_insert_with(Instant::now);

        match (self.state, event) {
            (FsmState::Wait, ReceiverEvent::PacketArrival(pkt)) => self.handle_packet(pkt),
            (FsmState::Closing, ReceiverEvent::PacketArrival(_)) => ReceiverOutput {
                delivered: Vec::new(),
                ack: Some(self.feedback_ack()),
            },
            (FsmState::Closing, ReceiverEvent::ClosingLingerTimeout) => {
                self.state = FsmState::Closed;
                log::debug!("{} {}:{}", self.state, self.base, self.base + self.window_size);
                ReceiverOutput::default()
            }
            (state, event) => {
                log::warn!("[gbn:recv] unexpected {event} in state {state}; ignored");
                ReceiverOutput::default()
            }
        }
    }

    /// Cumulative ACK for the last in-order frame delivered.
    fn feedback_ack(&self) -> Packet {
        Packet::ack(self.base - 1)
    }

    fn handle_packet(&mut self, pkt: Packet) -> ReceiverOutput {
        let mut out = ReceiverOutput::default();

        let acceptable = !pkt.is_corrupt()
            && matches!(pkt.kind(), Some(Kind::Data | Kind::Fin))
            && self.in_window(pkt.seq);
        if !acceptable {
            log::trace!("[gbn:recv] discarding {pkt} (base {})", self.base);
            out.ack = Some(self.feedback_ack());
            return out;
        }

        self.recv_buf.set(pkt.seq, pkt);

        // Deliver the contiguous run starting at base.
        while let Some(next) = self.recv_buf.clear(self.base) {
            self.base += 1;
            if next.is_fin() {
                self.fin_delivered = true;
                self.state = FsmState::Closing;
                self.timers.start(TimerKind::ClosingLinger);
                out.delivered.push(Vec::new());
                break;
            }
            // An empty chunk upstream means end of stream; only FIN may say so.
            if next.payload.is_empty() {
                log::debug!("[gbn:recv] empty DATA {} consumed, not delivered", next.seq);
                continue;
            }
            out.delivered.push(next.payload);
        }

        out.ack = Some(self.feedback_ack());
        out
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
