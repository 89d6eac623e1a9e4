//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "pothole-server", version, about = "Pothole complaint verification service")]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "POTHOLE_BIND", default_value = "0.0.0.0:5001", global = true)]
    pub bind: SocketAddr,

    /// DuckDB database file. Without one, complaints live in memory.
    #[arg(long, env = "POTHOLE_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// YOLOv8 ONNX model.
    #[arg(
        long,
        env = "POTHOLE_MODEL",
        default_value = "models/pothole/model.onnx",
        global = true
    )]
    pub model: PathBuf,

    /// Directory for downloaded images [default: <tmp>/uploads].
    #[arg(long, env = "POTHOLE_SCRATCH_DIR", global = true)]
    pub scratch_dir: Option<PathBuf>,

    /// Per-download network timeout.
    #[arg(long, env = "POTHOLE_FETCH_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub fetch_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Load complaints from a JSON array file.
    Import { file: PathBuf },
    /// Reset one complaint's verification to pending.
    Requeue { id: String },
}

impl Cli {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("uploads"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
