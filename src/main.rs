use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use omni_drive_runtime::config::{BAUD_RATE, LOOP_HZ};
use omni_drive_runtime::runtime::{self, Mode, Options};

/// Drive the omni base from command sequences or teleop
#[derive(Debug, Parser)]
#[command(name = "omni-drive", version)]
struct Cli {
    /// Serial device of the motion controller
    #[arg(long, env = "SER_PORT")]
    port: String,

    #[arg(long, default_value_t = BAUD_RATE)]
    baud: u32,

    /// Control loop rate for sequences and teleop
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    loop_hz: u64,

    #[command(subcommand)]
    mode: ModeArg,
}

#[derive(Debug, Subcommand)]
enum ModeArg {
    /// Run a command sequence to completion
    Run {
        /// JSON sequence file (defaults to centering on the tag, then stopping)
        #[arg(long)]
        sequence: Option<PathBuf>,

        /// Switch to teleop once the sequence completes
        #[arg(long)]
        then_teleop: bool,
    },
    /// Forward control requests to the base
    Teleop,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let cli = Cli::parse();
    let mode = match cli.mode {
        ModeArg::Run {
            sequence,
            then_teleop,
        } => Mode::Sequence {
            path: sequence,
            then_teleop,
        },
        ModeArg::Teleop => Mode::Teleop,
    };

    let opts = Options {
        port: cli.port,
        baud: cli.baud,
        loop_hz: cli.loop_hz,
        mode,
    };

    if let Err(e) = runtime::run(opts).await {
        tracing::error!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
