use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hyperbeat",
    about = "Share and replicate versioned file trees peer to peer",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Working directory holding dat.json
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Configuration file (default: $HYPERBEAT_HOME/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new tree and write dat.json
    Init,
    /// Import the working directory into the tree
    Add,
    /// List a directory of the tree
    Ls(PathArgs),
    /// Print a file of the tree
    Cat(PathArgs),
    /// Download a tree from the swarm and keep a local copy
    Pin(PinArgs),
    /// Join the swarm and serve a tree over HTTP
    Share(ShareArgs),
}

#[derive(Args)]
pub struct PathArgs {
    /// Tree path, e.g. /docs
    #[arg(long)]
    pub path: String,
}

#[derive(Args)]
pub struct PinArgs {
    #[arg(long)]
    pub key: String,
    /// Give up after this many seconds without completing
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct ShareArgs {
    /// HTTP port; the bind host comes from `http.bind_addr` (all interfaces by default)
    #[arg(long, default_value_t = beat_session::DEFAULT_PORT)]
    pub port: u16,
    /// Tree to share instead of the one in dat.json
    #[arg(long)]
    pub key: Option<String>,
}
