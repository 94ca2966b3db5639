//! Integration tests for Go-Back-N sessions.
//!
//! Each test runs a sending and a receiving session (or a session against a
//! raw transport end) inside one runtime.  Sessions drive themselves from
//! background tasks, so the test body plays the two applications.

use std::time::Duration;

use tokio::time::timeout;

use gbn_over_udp::packet::{Kind, Packet};
use gbn_over_udp::seq::Seq;
use gbn_over_udp::socket::UdpTransport;
use gbn_over_udp::timer::TimerConfig;
use gbn_over_udp::transport::{MemoryTransport, Transport};
use gbn_over_udp::{GbnError, GbnSession, Role, SessionConfig, SimulatorConfig, MAX_PAYLOAD};

/// Short timers so lossy runs finish quickly.
fn fast(window_size: usize, simulator: SimulatorConfig) -> SessionConfig {
    SessionConfig {
        window_size,
        simulator,
        timers: TimerConfig {
            retransmit: Duration::from_millis(20),
            closing_linger: Duration::from_millis(200),
            ..TimerConfig::default()
        },
        ..SessionConfig::default()
    }
}

fn demo_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{i:05} abcdefghijklmnopqrstuvwxyz\n"))
        .collect()
}

/// Push `lines` through a sender/receiver pair and return what came out.
async fn transfer<T>(
    tx_end: T,
    rx_end: T,
    tx_config: SessionConfig,
    rx_config: SessionConfig,
    lines: Vec<String>,
) -> Vec<u8>
where
    T: Transport + 'static,
{
    let mut sender = GbnSession::with_transport(tx_end, Role::Sender, tx_config).unwrap();
    let mut receiver = GbnSession::with_transport(rx_end, Role::Receiver, rx_config).unwrap();

    let producer = tokio::spawn(async move {
        for line in lines {
            sender.send(line).await.expect("send");
        }
        sender.close().await.expect("close");
        sender.join().await.expect("sender join")
    });

    let consumer = tokio::spawn(async move {
        let mut out = Vec::new();
        while let Some(chunk) = receiver.recv().await.expect("recv") {
            out.extend_from_slice(&chunk);
        }
        // End of stream is sticky.
        assert_eq!(receiver.recv().await.unwrap(), None);
        let stats = receiver.join().await.expect("receiver join");
        (out, stats)
    });

    let (sent, received) = tokio::join!(producer, consumer);
    let sender_stats = sent.unwrap();
    let (out, receiver_stats) = received.unwrap();
    assert!(sender_stats.sent > 0);
    assert!(receiver_stats.received > 0);
    out
}

// ---------------------------------------------------------------------------
// Test 1: 500 demo lines, N = 16, perfect channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_perfect_channel_delivers_in_order() {
    let lines = demo_lines(500);
    let expected: Vec<u8> = lines.concat().into_bytes();

    let (a, b) = MemoryTransport::pair();
    let cfg = fast(16, SimulatorConfig::perfect());
    let out = timeout(
        Duration::from_secs(30),
        transfer(a, b, cfg.clone(), cfg, lines),
    )
    .await
    .expect("transfer timed out");

    assert_eq!(out, expected);
}

// ---------------------------------------------------------------------------
// Test 2: lossy and corrupting channel in both directions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_noisy_channel_recovers() {
    let lines = demo_lines(200);
    let expected: Vec<u8> = lines.concat().into_bytes();

    let noisy = |seed| SimulatorConfig {
        seed: Some(seed),
        ..SimulatorConfig::noisy()
    };
    let (a, b) = MemoryTransport::pair();
    let out = timeout(
        Duration::from_secs(60),
        transfer(a, b, fast(8, noisy(1)), fast(8, noisy(2)), lines),
    )
    .await
    .expect("transfer timed out");

    assert_eq!(out, expected);
}

// ---------------------------------------------------------------------------
// Test 3: real UDP sockets on loopback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_udp_loopback_transfer() {
    let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    a.connect(b.local_addr).await.unwrap();
    b.connect(a.local_addr).await.unwrap();

    let lines = demo_lines(300);
    let expected: Vec<u8> = lines.concat().into_bytes();
    let cfg = fast(16, SimulatorConfig::perfect());
    let out = timeout(
        Duration::from_secs(30),
        transfer(a, b, cfg.clone(), cfg, lines),
    )
    .await
    .expect("transfer timed out");

    assert_eq!(out, expected);
}

// ---------------------------------------------------------------------------
// Test 4: a full window holds back further chunks until an ACK arrives
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_window_backpressure() {
    let (ours, peer) = MemoryTransport::pair();
    let cfg = SessionConfig {
        timers: TimerConfig {
            retransmit: Duration::from_secs(60),
            ..TimerConfig::default()
        },
        ..SessionConfig::with_window(2)
    };
    let session = GbnSession::with_transport(ours, Role::Sender, cfg).unwrap();

    for chunk in ["a", "b", "c"] {
        session.send(chunk).await.unwrap();
    }

    // Only the first two are on the wire.
    for (seq, payload) in [(0, b"a"), (1, b"b")] {
        let pkt = Packet::decode(&peer.receive().await.unwrap()).unwrap();
        assert_eq!(pkt.kind(), Some(Kind::Data));
        assert_eq!(pkt.seq, Seq::new(seq));
        assert_eq!(pkt.payload, payload);
    }
    assert!(timeout(Duration::from_millis(100), peer.receive())
        .await
        .is_err());

    // "c" still occupies the handoff slot, so a fourth chunk must wait.
    assert!(timeout(Duration::from_millis(100), session.send("d"))
        .await
        .is_err());

    // Acknowledging frame 0 opens one slot.
    peer.transmit(&Packet::ack(Seq::new(0)).to_bytes())
        .await
        .unwrap();
    let pkt = Packet::decode(&peer.receive().await.unwrap()).unwrap();
    assert_eq!(pkt.seq, Seq::new(2));
    assert_eq!(pkt.payload, b"c");
}

// ---------------------------------------------------------------------------
// Test 5: bounded retransmissions against a silent peer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_silent_peer_exhausts_retries() {
    let (ours, _peer) = MemoryTransport::pair();
    let cfg = SessionConfig {
        max_retransmits: Some(2),
        ..fast(4, SimulatorConfig::perfect())
    };
    let mut session = GbnSession::with_transport(ours, Role::Sender, cfg).unwrap();

    session.send("hello").await.unwrap();
    session.close().await.unwrap();

    let result = timeout(Duration::from_secs(5), session.join())
        .await
        .expect("join timed out");
    assert!(matches!(result, Err(GbnError::RetriesExhausted(2))));
}

// ---------------------------------------------------------------------------
// Test 6: dropping the sending session ends the stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dropped_sender_sends_fin() {
    let (a, b) = MemoryTransport::pair();
    let cfg = fast(4, SimulatorConfig::perfect());
    let sender = GbnSession::with_transport(a, Role::Sender, cfg.clone()).unwrap();
    let mut receiver = GbnSession::with_transport(b, Role::Receiver, cfg).unwrap();

    sender.send("only").await.unwrap();
    drop(sender);

    let first = timeout(Duration::from_secs(5), receiver.recv()).await.unwrap();
    assert_eq!(first.unwrap(), Some(b"only".to_vec()));
    let eos = timeout(Duration::from_secs(5), receiver.recv()).await.unwrap();
    assert_eq!(eos.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test 7: usage errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_role_and_lifecycle_errors() {
    let (a, b) = MemoryTransport::pair();
    let cfg = fast(4, SimulatorConfig::perfect());
    let mut sender = GbnSession::with_transport(a, Role::Sender, cfg.clone()).unwrap();
    let mut receiver = GbnSession::with_transport(b, Role::Receiver, cfg).unwrap();
    assert_eq!(sender.role(), Role::Sender);

    assert!(matches!(sender.recv().await, Err(GbnError::WrongRole)));
    assert!(matches!(receiver.send("x").await, Err(GbnError::WrongRole)));
    assert!(matches!(receiver.close().await, Err(GbnError::WrongRole)));

    sender.close().await.unwrap();
    // Closing twice is harmless; sending afterwards is not.
    sender.close().await.unwrap();
    assert!(matches!(
        sender.send("late").await,
        Err(GbnError::SessionClosed)
    ));

    let eos = timeout(Duration::from_secs(5), receiver.recv()).await.unwrap();
    assert_eq!(eos.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    for n in [0, 128, 256] {
        let (a, _b) = MemoryTransport::pair();
        let result = GbnSession::with_transport(a, Role::Sender, SessionConfig::with_window(n));
        assert!(matches!(result, Err(GbnError::InvalidWindow(w)) if w == n));
    }

    let (a, _b) = MemoryTransport::pair();
    let cfg = SessionConfig::default().simulator(SimulatorConfig {
        loss_rate: 1.5,
        ..SimulatorConfig::default()
    });
    assert!(matches!(
        GbnSession::with_transport(a, Role::Receiver, cfg),
        Err(GbnError::InvalidConfig(_))
    ));
}

// ---------------------------------------------------------------------------
// Test 8: chunk size is bounded by one UDP datagram
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_udp_chunk_size_limit() {
    let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    a.connect(b.local_addr).await.unwrap();
    b.connect(a.local_addr).await.unwrap();

    let cfg = SessionConfig {
        max_retransmits: Some(10),
        ..fast(4, SimulatorConfig::perfect())
    };
    let mut sender = GbnSession::with_transport(a, Role::Sender, cfg.clone()).unwrap();
    let mut receiver = GbnSession::with_transport(b, Role::Receiver, cfg).unwrap();

    assert!(matches!(
        sender.send(vec![b'x'; 3000]).await,
        Err(GbnError::ChunkTooLarge(3000))
    ));
    assert!(matches!(
        sender.send(vec![b'x'; MAX_PAYLOAD + 1]).await,
        Err(GbnError::ChunkTooLarge(n)) if n == MAX_PAYLOAD + 1
    ));

    // The largest accepted chunk arrives whole.
    let largest = vec![b'y'; MAX_PAYLOAD];
    sender.send(largest.clone()).await.unwrap();
    sender.close().await.unwrap();

    let got = timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("recv timed out")
        .unwrap();
    assert_eq!(got, Some(largest));
    let eos = timeout(Duration::from_secs(5), receiver.recv()).await.unwrap();
    assert_eq!(eos.unwrap(), None);

    let stats = timeout(Duration::from_secs(5), sender.join())
        .await
        .expect("join timed out")
        .unwrap();
    assert_eq!(stats.dropped, 0);
}
