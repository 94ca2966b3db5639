//! Fault-injecting channel for exercising the reliability mechanisms.
//!
//! Real networks drop, delay and damage packets.  [`ChannelSimulator`] wraps
//! a [`Transport`] and applies a configurable fault model on the send path:
//!
//! | Fault       | Description                                              |
//! |-------------|----------------------------------------------------------|
//! | Loss        | Drop a frame with probability `loss_rate`.               |
//! | Delay       | Sleep an exponential variate of mean `extra_mean_delay`. |
//! | Corruption  | Flip one random bit with probability `corrupt_rate`.     |
//!
//! A dropped frame is never also corrupted.  The receive path decodes every
//! datagram and hands it to the engine even when it is corrupt; detection and
//! recovery belong to the protocol.  Both directions are counted in
//! [`Statistics`].

use std::fmt;
use std::io;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::GbnError;
use crate::packet::Packet;
use crate::transport::Transport;

/// Configuration for the fault-injection model.
///
/// Probabilities are in `[0.0, 1.0)`.  The default is a perfect channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Probability that a frame is silently dropped.
    pub loss_rate: f64,
    /// Probability that a transmitted frame has one bit flipped.
    pub corrupt_rate: f64,
    /// Mean of the exponential extra delay added before each transmission.
    pub extra_mean_delay: Duration,
    /// RNG seed for reproducible fault sequences. `None` = random.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            extra_mean_delay: Duration::ZERO,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Perfect channel: no loss, no corruption, no extra delay.
    pub fn perfect() -> Self {
        Self::default()
    }

    /// The classic noisy lab setup: 10 % loss and 10 % bit errors.
    pub fn noisy() -> Self {
        Self {
            loss_rate: 0.1,
            corrupt_rate: 0.1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GbnError> {
        for (name, p) in [("loss_rate", self.loss_rate), ("corrupt_rate", self.corrupt_rate)] {
            if !(0.0..1.0).contains(&p) {
                return Err(GbnError::InvalidConfig(format!(
                    "{name} must be in [0, 1), got {p}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Frame counters for one entity, plus session duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Transmission attempts, including dropped ones.
    pub sent: u64,
    pub dropped: u64,
    /// Frames damaged on the way out.
    pub corrupted: u64,
    pub received: u64,
    /// Arrivals that failed the checksum.
    pub corrupt: u64,
    pub elapsed: Duration,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Packets sent: {} (dropping: {}, corrupting: {})",
            self.sent, self.dropped, self.corrupted
        )?;
        writeln!(f, "Packets rcvd: {} (corrupt: {})", self.received, self.corrupt)?;
        write!(f, "Time elapsed: {:.3} sec", self.elapsed.as_secs_f64())
    }
}

// ---------------------------------------------------------------------------
// ChannelSimulator
// ---------------------------------------------------------------------------

/// A fault-injecting wrapper around one transport endpoint.
pub struct ChannelSimulator<T> {
    transport: T,
    config: SimulatorConfig,
    rng: StdRng,
    stats: Statistics,
}

impl<T: Transport> ChannelSimulator<T> {
    pub fn new(transport: T, config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            transport,
            config,
            rng,
            stats: Statistics::default(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.stats.elapsed = elapsed;
    }

    pub fn into_stats(self) -> Statistics {
        self.stats
    }

    /// Send `packet` through the simulated network.
    pub async fn transmit(&mut self, packet: &Packet) -> io::Result<()> {
        self.stats.sent += 1;

        if self.config.loss_rate > 0.0 && self.rng.random::<f64>() < self.config.loss_rate {
            self.stats.dropped += 1;
            log::info!("[sim] dropping {packet}");
            return Ok(());
        }

        if !self.config.extra_mean_delay.is_zero() {
            tokio::time::sleep(self.exponential_delay()).await;
        }

        let mut pdu = packet.to_bytes();
        if self.config.corrupt_rate > 0.0 && self.rng.random::<f64>() < self.config.corrupt_rate {
            let byte = self.rng.random_range(0..pdu.len());
            let bit = self.rng.random_range(0..8u32);
            pdu[byte] ^= 1 << bit;
            self.stats.corrupted += 1;
            log::info!("[sim] corrupting {packet} (byte {byte}, bit {bit})");
        } else {
            log::debug!("[sim] → {packet}");
        }

        self.transport.transmit(&pdu).await
    }

    /// Receive the next frame, corrupt or not.
    ///
    /// Cancel-safe as long as the transport's `receive` is.
    pub async fn receive(&mut self) -> io::Result<Packet> {
        loop {
            let pdu = self.transport.receive().await?;
            self.stats.received += 1;
            match Packet::decode(&pdu) {
                Ok(packet) => {
                    if packet.is_corrupt() {
                        self.stats.corrupt += 1;
                    }
                    return Ok(packet);
                }
                Err(e) => {
                    self.stats.corrupt += 1;
                    log::warn!("[sim] discarding datagram: {e}");
                }
            }
        }
    }

    fn exponential_delay(&mut self) -> Duration {
        // Inverse-CDF sampling; 1 - u lies in (0, 1] so ln() is finite.
        let u: f64 = self.rng.random();
        self.config.extra_mean_delay.mul_f64(-(1.0 - u).ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::Seq;
    use crate::transport::MemoryTransport;

    fn seeded(loss_rate: f64, corrupt_rate: f64) -> SimulatorConfig {
        SimulatorConfig {
            loss_rate,
            corrupt_rate,
            seed: Some(7),
            ..SimulatorConfig::default()
        }
    }

    #[tokio::test]
    async fn perfect_channel_passes_frames_intact() {
        let (a, b) = MemoryTransport::pair();
        let mut tx = ChannelSimulator::new(a, SimulatorConfig::perfect());
        let mut rx = ChannelSimulator::new(b, SimulatorConfig::perfect());

        let pkt = Packet::data(Seq::new(3), b"hello".to_vec());
        tx.transmit(&pkt).await.unwrap();
        let got = rx.receive().await.unwrap();

        assert_eq!(got, pkt);
        assert_eq!(tx.stats().sent, 1);
        assert_eq!(rx.stats().received, 1);
        assert_eq!(rx.stats().corrupt, 0);
    }

    #[tokio::test]
    async fn total_loss_never_reaches_transport() {
        let (a, b) = MemoryTransport::pair();
        let mut tx = ChannelSimulator::new(a, seeded(1.0, 1.0));
        for n in 0..10 {
            tx.transmit(&Packet::ack(Seq::new(n))).await.unwrap();
        }
        assert_eq!(tx.stats().sent, 10);
        assert_eq!(tx.stats().dropped, 10);
        // Loss and corruption are exclusive per attempt.
        assert_eq!(tx.stats().corrupted, 0);

        tx.transport.transmit(b"marker").await.unwrap();
        assert_eq!(b.receive().await.unwrap(), b"marker");
    }

    #[tokio::test]
    async fn corruption_flips_exactly_one_bit() {
        let (a, b) = MemoryTransport::pair();
        let mut tx = ChannelSimulator::new(a, seeded(0.0, 1.0));
        let pkt = Packet::data(Seq::new(9), b"payload".to_vec());
        tx.transmit(&pkt).await.unwrap();

        let raw = b.receive().await.unwrap();
        let diff: u32 = raw
            .iter()
            .zip(pkt.to_bytes())
            .map(|(x, y)| (x ^ y).count_ones())
            .sum();
        assert_eq!(diff, 1);
        assert_eq!(tx.stats().corrupted, 1);
    }

    #[tokio::test]
    async fn corrupt_arrivals_are_returned_and_counted() {
        let (a, b) = MemoryTransport::pair();
        let mut tx = ChannelSimulator::new(a, seeded(0.0, 1.0));
        let mut rx = ChannelSimulator::new(b, SimulatorConfig::perfect());
        tx.transmit(&Packet::fin(Seq::new(1))).await.unwrap();

        let got = rx.receive().await.unwrap();
        assert!(got.is_corrupt());
        assert_eq!(rx.stats().received, 1);
        assert_eq!(rx.stats().corrupt, 1);
    }

    #[tokio::test]
    async fn short_datagrams_are_skipped() {
        let (a, b) = MemoryTransport::pair();
        let mut rx = ChannelSimulator::new(b, SimulatorConfig::perfect());
        a.transmit(&[1, 2]).await.unwrap();
        a.transmit(&Packet::ack(Seq::new(4)).to_bytes()).await.unwrap();

        let got = rx.receive().await.unwrap();
        assert_eq!(got.seq, Seq::new(4));
        assert_eq!(rx.stats().received, 2);
        assert_eq!(rx.stats().corrupt, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn extra_delay_postpones_delivery() {
        let (a, b) = MemoryTransport::pair();
        let config = SimulatorConfig {
            extra_mean_delay: Duration::from_millis(50),
            seed: Some(1),
            ..SimulatorConfig::default()
        };
        let mut tx = ChannelSimulator::new(a, config);
        let start = tokio::time::Instant::now();
        tx.transmit(&Packet::ack(Seq::new(0))).await.unwrap();
        assert!(start.elapsed() > Duration::ZERO);
        assert!(b.receive().await.is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_rates() {
        assert!(SimulatorConfig::noisy().validate().is_ok());
        assert!(seeded(1.0, 0.0).validate().is_err());
        assert!(seeded(0.0, -0.1).validate().is_err());
    }

    #[test]
    fn statistics_summary_format() {
        let stats = Statistics {
            sent: 10,
            dropped: 1,
            corrupted: 2,
            received: 8,
            corrupt: 1,
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(
            stats.to_string(),
            "Packets sent: 10 (dropping: 1, corrupting: 2)\n\
             Packets rcvd: 8 (corrupt: 1)\n\
             Time elapsed: 1.500 sec"
        );
    }
}
