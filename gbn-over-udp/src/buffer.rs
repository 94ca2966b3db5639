//! Frame storage indexed by sequence number.
//!
//! [`WindowBuffer`] has one slot per sequence number and is used both as the
//! sender's retransmit buffer and the receiver's out-of-order buffer.  It does
//! no window checking of its own: any [`Seq`] is a valid index, and callers
//! only populate slots inside their current window.

use crate::packet::Packet;
use crate::seq::{Seq, MOD};

#[derive(Debug)]
pub struct WindowBuffer {
    slots: Vec<Option<Packet>>,
    bufsize: usize,
}

impl WindowBuffer {
    /// Create an empty buffer for a window of `bufsize` frames.
    pub fn new(bufsize: usize) -> Self {
        Self {
            slots: vec![None; MOD],
            bufsize,
        }
    }

    /// Window size N this buffer was created for.
    pub fn bufsize(&self) -> usize {
        self.bufsize
    }

    pub fn get(&self, seq: Seq) -> Option<&Packet> {
        self.slots[usize::from(seq.value())].as_ref()
    }

    /// Store `packet` at `seq`, replacing whatever was there.
    pub fn set(&mut self, seq: Seq, packet: Packet) {
        self.slots[usize::from(seq.value())] = Some(packet);
    }

    /// Empty the slot at `seq`, returning its frame.
    pub fn clear(&mut self, seq: Seq) -> Option<Packet> {
        self.slots[usize::from(seq.value())].take()
    }

    /// Number of populated slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear() {
        let mut buf = WindowBuffer::new(4);
        let pkt = Packet::data(Seq::new(7), b"x".to_vec());
        buf.set(Seq::new(7), pkt.clone());
        assert_eq!(buf.get(Seq::new(7)), Some(&pkt));
        assert_eq!(buf.occupied(), 1);
        assert_eq!(buf.clear(Seq::new(7)), Some(pkt));
        assert_eq!(buf.get(Seq::new(7)), None);
        assert_eq!(buf.occupied(), 0);
    }

    #[test]
    fn every_sequence_number_has_a_slot() {
        let mut buf = WindowBuffer::new(16);
        for n in 0..MOD {
            buf.set(Seq::new(n), Packet::ack(Seq::new(n)));
        }
        assert_eq!(buf.occupied(), MOD);
        assert_eq!(buf.get(Seq::new(255)).map(|p| p.seq), Some(Seq::new(255)));
    }

    #[test]
    fn set_overwrites_duplicate() {
        let mut buf = WindowBuffer::new(2);
        buf.set(Seq::new(1), Packet::data(Seq::new(1), b"a".to_vec()));
        buf.set(Seq::new(1), Packet::data(Seq::new(1), b"a".to_vec()));
        assert_eq!(buf.occupied(), 1);
        assert_eq!(buf.bufsize(), 2);
    }

    #[test]
    fn clear_empty_slot_is_none() {
        let mut buf = WindowBuffer::new(2);
        assert_eq!(buf.clear(Seq::new(0)), None);
    }
}
