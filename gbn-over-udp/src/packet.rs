//! Wire-format definitions for GBN frames.
//!
//! Every datagram exchanged between the two entities is a [`Packet`].  This
//! module is responsible for:
//! - Defining the on-wire binary layout (kind flags, sequence number,
//!   checksum, payload).
//! - Building a checksummed [`Packet`] from its fields.
//! - Parsing an arbitrary byte slice back into a [`Packet`] **without**
//!   rejecting corrupt input; corruption is reported by
//!   [`Packet::is_corrupt`] so the protocol engines can decide what to do.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Kind      |   Sequence    |            Checksum           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The checksum is big-endian.  Total header size: [`HEADER_LEN`] = 4 bytes.

use std::fmt;

use thiserror::Error;

use crate::seq::Seq;

/// Bit-flag constants for the kind byte.
pub mod flags {
    /// Application data.
    pub const DATA: u8 = 0b0000_0001;
    /// Cumulative acknowledgement.
    pub const ACK: u8 = 0b0000_0010;
    /// End of stream; carries no payload.
    pub const FIN: u8 = 0b0000_0100;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 4;

/// Largest frame on the wire, header included.
pub const MAX_DATAGRAM: usize = 2048;

/// Largest payload one frame carries.
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM - HEADER_LEN;

const OFF_KIND: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_CHECKSUM: usize = 2;

/// The frame kinds this protocol sends.  Exactly one flag is set on every
/// frame built by [`Packet::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    Ack,
    Fin,
}

impl Kind {
    /// The flag bit for this kind.
    pub const fn flag(self) -> u8 {
        match self {
            Kind::Data => flags::DATA,
            Kind::Ack => flags::ACK,
            Kind::Fin => flags::FIN,
        }
    }

    fn from_flags(bits: u8) -> Option<Self> {
        match bits {
            flags::DATA => Some(Kind::Data),
            flags::ACK => Some(Kind::Ack),
            flags::FIN => Some(Kind::Fin),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Data => "DATA",
            Kind::Ack => "ACK",
            Kind::Fin => "FIN",
        };
        f.write_str(name)
    }
}

/// A GBN frame: header fields plus payload.
///
/// `flags` keeps the raw kind byte exactly as received, since a corrupted
/// datagram may carry a combination no sender would produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub flags: u8,
    pub seq: Seq,
    pub checksum: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a frame and compute its checksum.
    pub fn new(kind: Kind, seq: Seq, payload: Vec<u8>) -> Self {
        let mut pkt = Packet {
            flags: kind.flag(),
            seq,
            checksum: 0,
            payload,
        };
        // Checksum field is zero while computing the checksum.
        pkt.checksum = internet_checksum(&pkt.to_bytes());
        pkt
    }

    /// A DATA frame carrying one application chunk.
    pub fn data(seq: Seq, payload: Vec<u8>) -> Self {
        Self::new(Kind::Data, seq, payload)
    }

    /// A cumulative ACK for `seq`.
    pub fn ack(seq: Seq) -> Self {
        Self::new(Kind::Ack, seq, Vec::new())
    }

    /// An end-of-stream frame.
    pub fn fin(seq: Seq) -> Self {
        Self::new(Kind::Fin, seq, Vec::new())
    }

    /// Serialise into the exact on-wire bytes, stored checksum included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_KIND] = self.flags;
        buf[OFF_SEQ] = self.seq.value();
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&self.checksum.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse header fields out of a raw datagram.
    ///
    /// The checksum is **not** verified here; see [`Packet::is_corrupt`].
    /// Fails only when `buf` cannot hold a header.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::TooShort(buf.len()));
        }
        Ok(Packet {
            flags: buf[OFF_KIND],
            seq: Seq::from(buf[OFF_SEQ]),
            checksum: u16::from_be_bytes([buf[OFF_CHECKSUM], buf[OFF_CHECKSUM + 1]]),
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }

    /// `true` when the checksum over the full serialised frame does not
    /// fold to zero.
    pub fn is_corrupt(&self) -> bool {
        internet_checksum(&self.to_bytes()) != 0
    }

    /// The frame kind, or `None` for a flag byte no sender produces.
    pub fn kind(&self) -> Option<Kind> {
        Kind::from_flags(self.flags)
    }

    pub fn is_ack(&self) -> bool {
        self.flags & flags::ACK != 0
    }

    pub fn is_fin(&self) -> bool {
        self.flags & flags::FIN != 0
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{kind} {} len={}", self.seq, self.payload.len()),
            None => write!(f, "?{:#04x} {} len={}", self.flags, self.seq, self.payload.len()),
        }
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {0} bytes is too short to contain a header")]
    TooShort(usize),
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// Sum consecutive 16-bit big-endian words, fold the carry, return the
/// one's-complement.  Over a frame whose checksum field holds the value this
/// function produced for the zeroed frame, the result is `0`.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|w| match *w {
            [hi, lo] => u32::from(u16::from_be_bytes([hi, lo])),
            // Odd trailing byte: pad with a zero byte on the right.
            [hi] => u32::from(hi) << 8,
            _ => 0,
        })
        .sum();

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
