//! 8-bit wrap-around sequence numbers.
//!
//! Every frame carries a one-byte sequence number, so the sequence space has
//! [`MOD`] = 256 values and arithmetic wraps modulo `MOD`.
//!
//! # Circular ordering
//!
//! `a < b` holds when walking forward from `a` reaches `b` in fewer than
//! [`HALF`] steps.  The comparison is only meaningful while the true distance
//! between the operands is below `HALF`; at exactly `HALF` apart the two
//! values are unordered ([`PartialOrd::partial_cmp`] returns `None`).
//!
//! ```text
//!        a          a+HALF
//!  ──────┼────────────┼────────────▶ (wraps at MOD)
//!        │<── a < b ─▶│<── b < a ──
//! ```
//!
//! The ordering is not transitive across the whole ring, so `Seq` does not
//! implement [`Ord`] and must never be used as a `BTreeMap` key.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Number of distinct sequence numbers (8-bit space).
pub const MOD: usize = 1 << 8;

/// Half of the sequence space; the "ahead" / "behind" threshold.
pub const HALF: usize = MOD >> 1;

/// A sequence number in `[0, MOD)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Seq(u8);

impl Seq {
    /// Build a sequence number, reducing `n` modulo [`MOD`].
    pub const fn new(n: usize) -> Self {
        Self((n % MOD) as u8)
    }

    /// Raw value as it appears on the wire.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Forward distance from `self` to `to`, in `[0, MOD)`.
    ///
    /// `self + self.distance(to) == to` always holds.
    pub fn distance(self, to: Seq) -> usize {
        usize::from(to.0.wrapping_sub(self.0))
    }

    /// Lazy iterator over `[start, end)`, wrapping modulo [`MOD`].
    ///
    /// `range(s, s)` is empty.  The iterator is `Clone`, so a range can be
    /// restarted by cloning it before consumption.
    pub fn range(start: Seq, end: Seq) -> SeqRange {
        SeqRange { next: start, end }
    }
}

impl From<u8> for Seq {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

impl From<Seq> for u8 {
    fn from(s: Seq) -> Self {
        s.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Forward `n` steps.
impl Add<usize> for Seq {
    type Output = Seq;

    fn add(self, n: usize) -> Seq {
        Seq(self.0.wrapping_add((n % MOD) as u8))
    }
}

impl AddAssign<usize> for Seq {
    fn add_assign(&mut self, n: usize) {
        *self = *self + n;
    }
}

/// Backward `n` steps.
impl Sub<usize> for Seq {
    type Output = Seq;

    fn sub(self, n: usize) -> Seq {
        Seq(self.0.wrapping_sub((n % MOD) as u8))
    }
}

impl PartialOrd for Seq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.distance(*other) {
            0 => Some(Ordering::Equal),
            d if d < HALF => Some(Ordering::Less),
            d if d > HALF => Some(Ordering::Greater),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SeqRange
// ---------------------------------------------------------------------------

/// Iterator returned by [`Seq::range`].
#[derive(Debug, Clone)]
pub struct SeqRange {
    next: Seq,
    end: Seq,
}

impl Iterator for SeqRange {
    type Item = Seq;

    fn next(&mut self) -> Option<Seq> {
        if self.next == self.end {
            return None;
        }
        let cur = self.next;
        self.next += 1;
        Some(cur)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.next.distance(self.end);
        (n, Some(n))
    }
}

impl ExactSizeIterator for SeqRange {}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
