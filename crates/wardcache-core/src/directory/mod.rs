//! Directory normalization: deduplication and unit name resolution.
//!
//! Directory views overlap, so the same household or member can arrive more
//! than once in a single run. Everything here is pure and in-memory.

pub mod dedup;
pub mod units;

pub use dedup::{dedupe_households, dedupe_member_list_households, dedupe_members};
pub use units::{LookupError, UnitLookup};
