//! Entry point for `gbn-over-udp`.
//!
//! Parses CLI arguments and runs one protocol entity, either the **send**
//! side (stdin or generated demo lines) or the **recv** side (stdout).
//! All protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, stdio).

use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use gbn_over_udp::packet::MAX_PAYLOAD;
use gbn_over_udp::{GbnSession, Role, SessionConfig, SimulatorConfig, Statistics};

/// Go-Back-N reliable transfer over a lossy UDP channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send stdin (or generated lines) to the receiving peer.
    Send {
        #[command(flatten)]
        common: Common,
        /// Send this many generated demo lines instead of reading stdin.
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Receive a stream from the sending peer and print it to stdout.
    Recv {
        #[command(flatten)]
        common: Common,
    },
}

#[derive(Args)]
struct Common {
    /// Host name or address of the peer entity.
    #[arg(short, long, default_value = "localhost")]
    peer: String,
    /// Window size N.
    #[arg(short, long, default_value_t = 16)]
    window: usize,
    /// Probability a transmitted frame is dropped.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,
    /// Probability a transmitted frame has one bit flipped.
    #[arg(long, default_value_t = 0.1)]
    corrupt: f64,
    /// Mean extra per-frame delay in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// Seed for the fault RNG.
    #[arg(long)]
    seed: Option<u64>,
    /// Override the retransmit interval (defaults to 300 ms + 5 × delay).
    #[arg(long)]
    retransmit_ms: Option<u64>,
    /// Receiver linger after FIN, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    linger_ms: u64,
    /// Give up after this many consecutive fruitless retransmissions.
    #[arg(long)]
    max_retransmits: Option<u32>,
}

impl Common {
    fn session_config(&self) -> SessionConfig {
        let simulator = SimulatorConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            extra_mean_delay: Duration::from_millis(self.delay_ms),
            seed: self.seed,
        };
        let mut config = SessionConfig::with_window(self.window).simulator(simulator);
        if let Some(ms) = self.retransmit_ms {
            config.timers.retransmit = Duration::from_millis(ms);
        }
        config.timers.closing_linger = Duration::from_millis(self.linger_ms);
        config.max_retransmits = self.max_retransmits;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let (config, stats) = match cli.mode {
        Mode::Send { common, lines } => {
            let config = common.session_config();
            log::info!("Starting sender, peer {}", common.peer);
            let stats = run_sender(&common.peer, config.clone(), lines).await?;
            (config, stats)
        }
        Mode::Recv { common } => {
            let config = common.session_config();
            log::info!("Starting receiver, peer {}", common.peer);
            let stats = run_receiver(&common.peer, config.clone()).await?;
            (config, stats)
        }
    };

    print_summary(&config, &stats);
    Ok(())
}

async fn run_sender(
    peer: &str,
    config: SessionConfig,
    lines: Option<usize>,
) -> anyhow::Result<Statistics> {
    let mut session = GbnSession::open_with_config(peer, Role::Sender, config)
        .await
        .context("opening sender session")?;

    match lines {
        Some(count) => {
            for i in 0..count {
                session
                    .send(format!("{i:05} abcdefghijklmnopqrstuvwxyz\n"))
                    .await?;
            }
        }
        None => {
            let mut stdin = BufReader::new(tokio::io::stdin());
            let mut line = String::new();
            while stdin.read_line(&mut line).await.context("reading stdin")? > 0 {
                for piece in line.as_bytes().chunks(MAX_PAYLOAD) {
                    session.send(piece).await?;
                }
                line.clear();
            }
        }
    }

    session.close().await?;
    Ok(session.join().await?)
}

async fn run_receiver(peer: &str, config: SessionConfig) -> anyhow::Result<Statistics> {
    let mut session = GbnSession::open_with_config(peer, Role::Receiver, config)
        .await
        .context("opening receiver session")?;

    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = session.recv().await? {
        stdout.write_all(&chunk).await?;
    }
    stdout.flush().await?;

    Ok(session.join().await?)
}

fn print_summary(config: &SessionConfig, stats: &Statistics) {
    println!();
    println!("*** GBN parameters ***");
    println!("Window size: {}", config.window_size);
    println!(
        "LOSSRATE: {} PER: {} extra MEAN_DELAY: {:.3} sec",
        config.simulator.loss_rate,
        config.simulator.corrupt_rate,
        config.simulator.extra_mean_delay.as_secs_f64()
    );
    println!("*** Statistics ***");
    println!("{stats}");
}
