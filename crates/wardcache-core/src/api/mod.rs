//! REST client for the membership directory service.
//!
//! This module provides the `DirectoryClient`, the live `Fetcher` used when a
//! snapshot is not cached yet. Responses are kept as opaque JSON; only the
//! few fields needed to address follow-up requests are decoded here.
//!
//! Authentication is a username/password exchange that yields a session
//! cookie, held by the client's cookie store for the rest of the run.

pub mod client;
pub mod error;

pub use client::{DirectoryClient, UserProfile};
pub use error::ApiError;
