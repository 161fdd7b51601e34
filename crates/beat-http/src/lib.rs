//! HTTP bridge for hyperbeat.
//!
//! Requests are answered by walking a [`MountTable`] in order: the first
//! mount that has the path answers, a miss falls through to the next, and
//! when every mount misses the response is `404`. Tree mounts stream file
//! bodies chunk by chunk straight out of the content store.

pub mod config;
pub mod error;
pub mod handler;
pub mod listing;
pub mod mount;
pub mod range;
pub mod router;
pub mod server;
pub mod source;

pub use config::{url_for, HttpConfig, DEFAULT_PORT};
pub use error::{HttpError, HttpResult};
pub use mount::{Mount, MountTable, MountTarget};
pub use server::{BoundServer, ContentServer};
pub use source::{ContentSource, ListingEntry};
