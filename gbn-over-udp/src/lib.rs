//! `gbn-over-udp` — Go-Back-N ARQ over a simulated lossy datagram channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐    DATA / FIN    ┌──────────┐
//!  │ GBNsend  │─────────────────▶│ GBNrecv  │
//!  └────┬─────┘                  └─────┬────┘
//!       │      cumulative ACKs         │
//!       │◀─────────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │            GbnSession             │
//!  │ (event loop task + handoff queues)│
//!  └────┬──────────────────────────────┘
//!       │ frames
//!  ┌────▼─────────────┐
//!  │ ChannelSimulator │  loss / delay / bit errors
//!  └────┬─────────────┘
//!       │ raw datagrams
//!  ┌────▼──────┐
//!  │ Transport │  UDP socket or in-memory pair
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`seq`]          — 8-bit circular sequence numbers
//! - [`packet`]       — wire format and Internet checksum
//! - [`buffer`]       — per-sequence-number frame slots
//! - [`timer`]        — polled retransmit / linger timers
//! - [`simulator`]    — fault-injecting channel and statistics
//! - [`transport`]    — datagram transport trait and in-memory pair
//! - [`socket`]       — UDP transport
//! - [`state`]        — finite-state-machine types
//! - [`gbn_sender`]   — sending window state machine
//! - [`gbn_receiver`] — receiving window state machine
//! - [`gbn_session`]  — application-facing session runtime
//! - [`error`]        — crate error type

pub mod buffer;
pub mod error;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod gbn_session;
pub mod packet;
pub mod seq;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;
pub mod transport;

pub use error::{GbnError, Result};
pub use gbn_session::{GbnSession, SessionConfig};
pub use packet::MAX_PAYLOAD;
pub use simulator::{SimulatorConfig, Statistics};
pub use state::Role;
