//! Session orchestration for hyperbeat.
//!
//! Each command runs inside one [`Session`]: it acquires the content store,
//! then the tree, then optionally the swarm and the HTTP bridge, and releases
//! them in reverse order whether the command succeeds or fails. Progress is
//! tracked by an explicit [`SessionState`] machine that rejects out-of-order
//! steps.

pub mod commands;
pub mod config;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod session;
pub mod state;

pub use beat_http::DEFAULT_PORT;
pub use commands::{
    add, cat, init, ls, pin, share, AddOutcome, CatOutcome, Context, InitOutcome, Lookup,
    LsOutcome, PinOutcome, Share, TreeAnnouncer,
};
pub use config::{home_dir, BeatConfig, ConfigError, StoreSection, SwarmSection};
pub use error::{SessionError, SessionResult};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use session::Session;
pub use state::{SessionState, StateMachine};
