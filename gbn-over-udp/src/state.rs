//! Finite-state-machine types shared by both protocol entities.
//!
//! ```text
//!  sender:    WAIT ──FIN sent──▶ CLOSING ──last ACK──▶ CLOSED
//!  receiver:  WAIT ──FIN delivered──▶ CLOSING ──linger timeout──▶ CLOSED
//! ```
//!
//! Transitions live in [`crate::gbn_sender`] and [`crate::gbn_receiver`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsmState {
    /// Normal operation; initial state.
    #[default]
    Wait,
    /// Sender: FIN sent, draining outstanding ACKs.
    /// Receiver: FIN delivered, lingering for a duplicate FIN.
    Closing,
    /// Terminal.
    Closed,
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which half of the protocol a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Active side: takes chunks from the application and transmits them.
    Sender,
    /// Passive side: delivers chunks to the application.
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => f.write_str("GBNsend"),
            Role::Receiver => f.write_str("GBNrecv"),
        }
    }
}
