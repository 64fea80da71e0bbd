//! Credential resolution for the directory service.
//!
//! This module provides:
//! - `Credentials`: a resolved username/password pair
//! - `CredentialStore`: optional OS-level password storage via keyring
//!
//! Credentials are only resolved when a snapshot actually has to be fetched.

pub mod credentials;

pub use credentials::{ConfigError, CredentialStore, Credentials, PasswordPrompt};
