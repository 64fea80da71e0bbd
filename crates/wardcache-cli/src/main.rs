//! wardcache - offline exports of a membership directory.
//!
//! Directory queries are cached locally on first use and reused on every
//! later run, so rosters and mailing lists can be regenerated offline.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wardcache_core::auth::credentials::{PASSWORD_ENV, USERNAME_ENV};
use wardcache_core::{Config, LiveFetcher, Mode, Output, Pipeline, SnapshotStore};

#[derive(Parser, Debug)]
#[command(name = "wardcache", version)]
#[command(about = "Export the membership directory to CSV, caching every query locally")]
#[command(group(ArgGroup::new("mode").args(["self_info", "ward", "household_list", "member_list"])))]
struct Cli {
    /// Directory username
    #[arg(short, long, env = USERNAME_ENV)]
    username: Option<String>,

    /// Directory password (prompted for when missing)
    #[arg(short, long, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,

    /// Save output CSV to file instead of stdout
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Show info on self
    #[arg(short = 's', long = "self")]
    self_info: bool,

    /// Show info on the units in the parent unit
    #[arg(short, long)]
    ward: bool,

    /// Households in the unit as CSV (default)
    #[arg(short = 'l', long)]
    household_list: bool,

    /// Household mailing labels from the member list as CSV
    #[arg(short, long)]
    member_list: bool,

    /// Cache directory (defaults to the platform cache directory)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Delete this mode's cached snapshots and fetch them again
    #[arg(long)]
    refresh: bool,

    /// Look up the password in the OS keychain before prompting
    #[arg(long)]
    keychain: bool,

    /// Save the password to the OS keychain after signing in
    #[arg(long)]
    remember: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.self_info {
            Mode::SelfInfo
        } else if self.ward {
            Mode::Units
        } else if self.member_list {
            Mode::MemberList
        } else {
            Mode::Households
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=info).
    // Logs go to stderr so CSV on stdout stays clean.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn prompt_password(username: &str) -> Result<String> {
    rpassword::prompt_password(format!("Please enter the password for {}: ", username))
        .context("Failed to read password")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    let mode = cli.mode();
    info!(?mode, "wardcache starting");

    let mut config = Config::load()?;
    let cache_dir = config.cache_dir(cli.cache_dir.as_deref())?;
    let store = SnapshotStore::new(cache_dir)?;

    let username = cli.username.clone().or_else(|| config.last_username.clone());
    let mut fetcher = LiveFetcher::new(username, cli.password.clone(), &prompt_password)?;
    if cli.keychain || cli.remember {
        fetcher = fetcher.with_keychain(cli.remember);
    }

    let mut pipeline = Pipeline::new(store, fetcher);
    if cli.refresh {
        pipeline.refresh(mode)?;
    }

    let output = cli.file.clone().map(Output::File).unwrap_or_default();
    pipeline.run(mode, &output).await?;

    if let Some(user) = pipeline.fetcher().signed_in_as() {
        if config.last_username.as_deref() != Some(user) {
            config.last_username = Some(user.to_string());
            if let Err(e) = config.save() {
                warn!(error = %e, "Could not save config");
            }
        }
    }

    Ok(())
}
