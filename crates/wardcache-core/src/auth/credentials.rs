use std::fmt;

use anyhow::{Context, Result};
use keyring::Entry;
use thiserror::Error;
use tracing::debug;

const SERVICE_NAME: &str = "wardcache";

/// Environment variable holding the directory username.
pub const USERNAME_ENV: &str = "CHURCH_USERNAME";

/// Environment variable holding the directory password.
pub const PASSWORD_ENV: &str = "CHURCH_PASSWORD";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Please set your username with --username or the CHURCH_USERNAME environment variable")]
    MissingUsername,

    #[error("No password entered for {0}")]
    EmptyPassword(String),
}

/// Asks the operator for a password. Receives the username being signed in.
pub type PasswordPrompt<'a> = dyn Fn(&str) -> Result<String> + 'a;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Resolve a full credential pair.
    ///
    /// A missing username fails immediately. A missing password is looked up
    /// in the keychain (when `use_keychain` is set) and otherwise requested
    /// through `prompt`.
    pub fn resolve(
        username: Option<&str>,
        password: Option<&str>,
        use_keychain: bool,
        prompt: &PasswordPrompt<'_>,
    ) -> Result<Self> {
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUsername)?
            .to_string();

        let password = match password.filter(|p| !p.is_empty()) {
            Some(password) => password.to_string(),
            None => {
                let stored = if use_keychain {
                    CredentialStore::get_password(&username).ok()
                } else {
                    None
                };
                match stored {
                    Some(password) => {
                        debug!(username = %username, "Using password from keychain");
                        password
                    }
                    None => {
                        let typed = prompt(&username)?;
                        if typed.is_empty() {
                            return Err(ConfigError::EmptyPassword(username).into());
                        }
                        typed
                    }
                }
            }
        };

        Ok(Self { username, password })
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store username and password in the OS keychain
    pub fn store(username: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve password for a username from the OS keychain
    pub fn get_password(username: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }
}
