//! Local snapshot cache for offline directory access.
//!
//! This module provides the `SnapshotStore`, a get-or-fetch cache holding
//! one verbatim JSON document per entity kind:
//!
//! - Self profile (`self.json`)
//! - Household directory (`households.json`)
//! - Unit list (`units.json`)
//! - Member list (`member_list.json`)
//!
//! Snapshots never expire. Delete the file (or pass `--refresh`) to refetch.

pub mod snapshot;

pub use snapshot::{CacheError, Snapshot, SnapshotKind, SnapshotStore};
