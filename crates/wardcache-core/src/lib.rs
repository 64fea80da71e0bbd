//! Offline membership directory exports.
//!
//! Directory queries are cached as verbatim JSON snapshots, then
//! deduplicated and flattened into CSV for mailing lists and rosters.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod directory;
pub mod export;
pub mod models;
pub mod pipeline;

pub use cache::{SnapshotKind, SnapshotStore};
pub use config::Config;
pub use pipeline::{Fetcher, LiveFetcher, Mode, Output, Pipeline};
