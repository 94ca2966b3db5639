//! Polled single-shot timers.
//!
//! Each protocol entity keeps one [`ExpiryTimers`] registry holding at most
//! one pending deadline per [`TimerKind`]:
//! - [`TimerKind::Retransmit`] — fires when the oldest unacknowledged frame
//!   has been outstanding for the retransmit interval.
//! - [`TimerKind::ClosingLinger`] — receiver-side wait after FIN delivery,
//!   absorbing a duplicate FIN whose ACK was lost.
//! - [`TimerKind::DelayedAck`] — reserved ACK-coalescing interval.
//!
//! Nothing runs in the background: the event loop asks
//! [`ExpiryTimers::next_deadline`] how long it may sleep and then calls
//! [`ExpiryTimers::poll_expired`] once per wake-up.  Deadlines use
//! `tokio::time::Instant` so tests can pause and advance the clock.

use std::time::Duration;

use tokio::time::Instant;

/// The named timeouts an entity may arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Retransmit,
    ClosingLinger,
    DelayedAck,
}

impl TimerKind {
    const ALL: [TimerKind; 3] = [
        TimerKind::Retransmit,
        TimerKind::ClosingLinger,
        TimerKind::DelayedAck,
    ];

    fn index(self) -> usize {
        match self {
            TimerKind::Retransmit => 0,
            TimerKind::ClosingLinger => 1,
            TimerKind::DelayedAck => 2,
        }
    }
}

/// Adjustable timeout intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub retransmit: Duration,
    pub closing_linger: Duration,
    pub delayed_ack: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            retransmit: Duration::from_millis(300),
            closing_linger: Duration::from_secs(1),
            delayed_ack: Duration::from_millis(500),
        }
    }
}

impl TimerConfig {
    /// Defaults with the retransmit interval stretched for a channel that
    /// adds `extra_mean_delay` per frame: `0.3 s + 5 × delay`.
    pub fn for_delay(extra_mean_delay: Duration) -> Self {
        let base = Self::default();
        Self {
            retransmit: base.retransmit + extra_mean_delay * 5,
            ..base
        }
    }

    pub fn interval(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::Retransmit => self.retransmit,
            TimerKind::ClosingLinger => self.closing_linger,
            TimerKind::DelayedAck => self.delayed_ack,
        }
    }

    pub fn set_interval(&mut self, kind: TimerKind, interval: Duration) {
        match kind {
            TimerKind::Retransmit => self.retransmit = interval,
            TimerKind::ClosingLinger => self.closing_linger = interval,
            TimerKind::DelayedAck => self.delayed_ack = interval,
        }
    }
}

/// Registry of pending deadlines, one slot per [`TimerKind`].
#[derive(Debug)]
pub struct ExpiryTimers {
    intervals: TimerConfig,
    deadlines: [Option<Instant>; 3],
}

impl Default for ExpiryTimers {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl ExpiryTimers {
    pub fn new(intervals: TimerConfig) -> Self {
        Self {
            intervals,
            deadlines: [None; 3],
        }
    }

    /// Arm `kind` to expire one interval from now, replacing any pending
    /// deadline of the same kind.
    pub fn start(&mut self, kind: TimerKind) {
        self.deadlines[kind.index()] = Some(Instant::now() + self.intervals.interval(kind));
    }

    pub fn stop(&mut self, kind: TimerKind) {
        self.deadlines[kind.index()] = None;
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.deadlines[kind.index()].is_some()
    }

    /// Return the due timer with the earliest deadline and disarm it.
    ///
    /// Only one timer is reported per call; poll again to find others that
    /// are due at the same time.
    pub fn poll_expired(&mut self) -> Option<TimerKind> {
        self.poll_expired_at(Instant::now())
    }

    fn poll_expired_at(&mut self, now: Instant) -> Option<TimerKind> {
        let kind = TimerKind::ALL
            .into_iter()
            .filter_map(|k| self.deadlines[k.index()].map(|t| (t, k)))
            .filter(|(t, _)| *t <= now)
            .min_by_key(|(t, _)| *t)
            .map(|(_, k)| k)?;
        self.deadlines[kind.index()] = None;
        Some(kind)
    }

    /// Earliest pending deadline, if any timer is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    pub fn interval(&self, kind: TimerKind) -> Duration {
        self.intervals.interval(kind)
    }

    /// Change the interval used by future [`start`](Self::start) calls.
    pub fn set_interval(&mut self, kind: TimerKind, interval: Duration) {
        self.intervals.set_interval(kind, interval);
    }
}
