//! Crate-wide error type.
//!
//! Only usage errors and fatal transport errors surface here.  Loss,
//! corruption, duplication and out-of-window frames are protocol-level
//! events the engines recover from by retransmission; they cost latency,
//! never an `Err`.

use thiserror::Error;

use crate::packet::MAX_PAYLOAD;
use crate::seq::HALF;

#[derive(Debug, Error)]
pub enum GbnError {
    #[error("window size {0} outside 1..{max}", max = HALF)]
    InvalidWindow(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("operation not available for this session role")]
    WrongRole,

    #[error("chunk of {0} bytes exceeds the {max}-byte payload limit", max = MAX_PAYLOAD)]
    ChunkTooLarge(usize),

    #[error("session already closed for sending")]
    SessionClosed,

    #[error("protocol engine stopped")]
    EngineStopped,

    #[error("gave up after {0} consecutive retransmissions")]
    RetriesExhausted(u32),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, GbnError>;
