//! The snapshot-cache-and-normalize pipeline.
//!
//! One parameterized pipeline serves every export mode: snapshots come from
//! the `SnapshotStore` (fetching through a `Fetcher` on a miss), are decoded
//! into models, deduplicated and projected. Output is rendered completely in
//! memory before anything reaches the destination.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{DirectoryClient, UserProfile};
use crate::auth::{CredentialStore, Credentials, PasswordPrompt};
use crate::cache::{SnapshotKind, SnapshotStore};
use crate::directory::{dedupe_households, dedupe_member_list_households, UnitLookup};
use crate::export::{project_households, project_mailing_list, write_csv};
use crate::models::{Household, MemberListEntry, Unit};

/// Which projection a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Raw profile of the signed-in user, as JSON.
    SelfInfo,
    /// Raw parent unit with its child units, as JSON.
    Units,
    /// One CSV row per member of every household.
    #[default]
    Households,
    /// One CSV mailing label per household of the member list.
    MemberList,
}

impl Mode {
    /// Snapshots this mode reads.
    pub fn snapshot_kinds(self) -> &'static [SnapshotKind] {
        match self {
            Mode::SelfInfo => &[SnapshotKind::SelfProfile],
            Mode::Units => &[SnapshotKind::Units],
            Mode::Households => &[SnapshotKind::Households, SnapshotKind::Units],
            Mode::MemberList => &[SnapshotKind::MemberList],
        }
    }
}

/// Where rendered output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Stdout,
    File(PathBuf),
}

impl Output {
    /// Write a fully rendered document. Files are only created here, after
    /// rendering has succeeded.
    pub fn write(&self, contents: &[u8]) -> Result<()> {
        match self {
            Output::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(contents)?;
                stdout.flush()?;
            }
            Output::File(path) => {
                std::fs::write(path, contents)
                    .with_context(|| format!("Failed to write output file: {}", path.display()))?;
                info!(path = %path.display(), "Wrote output");
            }
        }
        Ok(())
    }
}

/// Source of live payloads for snapshots that are not cached yet.
pub trait Fetcher {
    fn fetch(&mut self, kind: SnapshotKind) -> impl Future<Output = Result<Value>>;
}

/// Fetches from the directory service, signing in on first use.
pub struct LiveFetcher<'a> {
    client: DirectoryClient,
    username: Option<String>,
    password: Option<String>,
    use_keychain: bool,
    remember_password: bool,
    prompt: &'a PasswordPrompt<'a>,
    profile: Option<UserProfile>,
    signed_in_as: Option<String>,
}

impl<'a> LiveFetcher<'a> {
    pub fn new(
        username: Option<String>,
        password: Option<String>,
        prompt: &'a PasswordPrompt<'a>,
    ) -> Result<Self> {
        Ok(Self {
            client: DirectoryClient::new()?,
            username,
            password,
            use_keychain: false,
            remember_password: false,
            prompt,
            profile: None,
            signed_in_as: None,
        })
    }

    /// Look up missing passwords in the OS keychain before prompting.
    pub fn with_keychain(mut self, remember_password: bool) -> Self {
        self.use_keychain = true;
        self.remember_password = remember_password;
        self
    }

    /// Username of the session opened during this run, if any.
    pub fn signed_in_as(&self) -> Option<&str> {
        self.signed_in_as.as_deref()
    }

    async fn ensure_signed_in(&mut self) -> Result<()> {
        if self.client.is_authenticated() {
            return Ok(());
        }

        let credentials = Credentials::resolve(
            self.username.as_deref(),
            self.password.as_deref(),
            self.use_keychain,
            self.prompt,
        )?;
        self.client.authenticate(&credentials).await?;

        if self.remember_password {
            if let Err(e) = CredentialStore::store(&credentials.username, &credentials.password) {
                warn!(error = %e, "Could not save password to keychain");
            }
        }
        self.signed_in_as = Some(credentials.username);
        Ok(())
    }

    async fn profile(&mut self) -> Result<UserProfile> {
        if let Some(ref profile) = self.profile {
            return Ok(profile.clone());
        }
        let profile = self.client.fetch_profile().await?;
        self.profile = Some(profile.clone());
        Ok(profile)
    }
}

impl Fetcher for LiveFetcher<'_> {
    async fn fetch(&mut self, kind: SnapshotKind) -> Result<Value> {
        self.ensure_signed_in().await?;
        match kind {
            SnapshotKind::SelfProfile => self.client.fetch_user_details().await,
            SnapshotKind::Households => {
                let unit = self.profile().await?.home_unit()?;
                self.client.fetch_directory(unit).await
            }
            SnapshotKind::Units => {
                let parent = self.profile().await?.parent_unit()?;
                self.client.fetch_units(parent).await
            }
            SnapshotKind::MemberList => {
                let unit = self.profile().await?.home_unit()?;
                self.client.fetch_member_list(unit).await
            }
        }
    }
}

pub struct Pipeline<F> {
    store: SnapshotStore,
    fetcher: F,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(store: SnapshotStore, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Drop the snapshots `mode` reads so the next run fetches them again.
    pub fn refresh(&self, mode: Mode) -> Result<()> {
        for kind in mode.snapshot_kinds() {
            self.store.clear(*kind)?;
        }
        Ok(())
    }

    async fn snapshot(&mut self, kind: SnapshotKind) -> Result<Value> {
        let fetcher = &mut self.fetcher;
        self.store
            .get_or_fetch(kind, move || {
                let fetcher = fetcher;
                fetcher.fetch(kind)
            })
            .await
    }

    async fn decode<T: DeserializeOwned>(&mut self, kind: SnapshotKind) -> Result<T> {
        let payload = self.snapshot(kind).await?;
        serde_json::from_value(payload).with_context(|| {
            format!(
                "Cached {} does not match the expected shape ({})",
                kind,
                self.store.path(kind).display()
            )
        })
    }

    /// Produce the complete output document for `mode`.
    pub async fn render(&mut self, mode: Mode) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match mode {
            Mode::SelfInfo | Mode::Units => {
                let kind = mode.snapshot_kinds()[0];
                let payload = self.snapshot(kind).await?;
                serde_json::to_writer_pretty(&mut out, &payload)?;
                out.push(b'\n');
            }
            Mode::Households => {
                let households: Vec<Household> = self.decode(SnapshotKind::Households).await?;
                let parent: Unit = self.decode(SnapshotKind::Units).await?;
                info!(count = households.len(), "Loaded households");

                let units = UnitLookup::from_units(&parent.child_units);
                let unique = dedupe_households(households);
                let rows = project_households(&unique, &units)?;
                info!(
                    households = unique.len(),
                    members = rows.len(),
                    units = units.len(),
                    "Projected household directory"
                );
                write_csv(&mut out, &rows)?;
            }
            Mode::MemberList => {
                let entries: Vec<MemberListEntry> = self.decode(SnapshotKind::MemberList).await?;
                info!(count = entries.len(), "Loaded members");

                let unique = dedupe_member_list_households(&entries);
                info!(households = unique.len(), "Projected mailing list");
                write_csv(&mut out, &project_mailing_list(&unique))?;
            }
        }
        Ok(out)
    }

    /// Render `mode` and write it to `output`. Nothing is written unless the
    /// whole projection succeeds.
    pub async fn run(&mut self, mode: Mode, output: &Output) -> Result<()> {
        let rendered = self.render(mode).await?;
        output.write(&rendered)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ConfigError;
    use crate::directory::LookupError;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeFetcher {
        payloads: HashMap<SnapshotKind, Value>,
        calls: Vec<SnapshotKind>,
    }

    impl FakeFetcher {
        fn with(mut self, kind: SnapshotKind, payload: Value) -> Self {
            self.payloads.insert(kind, payload);
            self
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(&mut self, kind: SnapshotKind) -> Result<Value> {
            self.calls.push(kind);
            self.payloads
                .get(&kind)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no payload for {}", kind))
        }
    }

    fn ward_fixture() -> FakeFetcher {
        FakeFetcher::default()
            .with(
                SnapshotKind::Households,
                json!([
                    {"uuid": 1, "displayName": "Smith", "unitNumber": 10,
                     "members": [{"uuid": "a", "preferredName": "Alice"}]},
                    {"uuid": 1, "displayName": "Smith", "unitNumber": 10,
                     "members": [{"uuid": "a", "preferredName": "Alice"},
                                 {"uuid": "b", "preferredName": "Bob", "phone": "555-0100"}]}
                ]),
            )
            .with(
                SnapshotKind::Units,
                json!({"unitNumber": 500, "name": "Stake",
                       "childUnits": [{"unitNumber": 10, "name": "Main Ward"}]}),
            )
    }

    fn pipeline(fetcher: FakeFetcher) -> (tempfile::TempDir, Pipeline<FakeFetcher>) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().to_path_buf()).unwrap();
        (dir, Pipeline::new(store, fetcher))
    }

    #[tokio::test]
    async fn test_household_mode_end_to_end() {
        let (_dir, mut pipeline) = pipeline(ward_fixture());
        let csv = String::from_utf8(pipeline.render(Mode::Households).await.unwrap()).unwrap();

        assert_eq!(
            csv,
            "Name,Household,Unit,Address,Phone,Email,Birthdate,Positions\n\
             Alice,Smith,Main Ward,,,,,\n\
             Bob,Smith,Main Ward,,555-0100,,,\n"
        );
        assert_eq!(
            pipeline.fetcher().calls,
            vec![SnapshotKind::Households, SnapshotKind::Units]
        );
    }

    #[tokio::test]
    async fn test_second_run_uses_cache_only() {
        let (_dir, mut pipeline) = pipeline(ward_fixture());
        let first = pipeline.render(Mode::Households).await.unwrap();
        let second = pipeline.render(Mode::Households).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(pipeline.fetcher().calls.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_refetches_mode_snapshots() {
        let (_dir, mut pipeline) = pipeline(ward_fixture());
        pipeline.render(Mode::Households).await.unwrap();
        pipeline.refresh(Mode::Households).unwrap();
        pipeline.render(Mode::Households).await.unwrap();

        assert_eq!(pipeline.fetcher().calls.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_unit_fails_without_output() {
        let fetcher = ward_fixture().with(
            SnapshotKind::Units,
            json!({"unitNumber": 500, "name": "Stake",
                   "childUnits": [{"unitNumber": 11, "name": "Other Ward"}]}),
        );
        let (dir, mut pipeline) = pipeline(fetcher);
        let target = dir.path().join("out.csv");

        let err = pipeline
            .run(Mode::Households, &Output::File(target.clone()))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LookupError>(),
            Some(LookupError::UnknownUnit { unit: 10, .. })
        ));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_run_writes_file() {
        let (dir, mut pipeline) = pipeline(ward_fixture());
        let target = dir.path().join("out.csv");

        pipeline
            .run(Mode::Households, &Output::File(target.clone()))
            .await
            .unwrap();

        let written = std::fs::read_to_string(target).unwrap();
        assert_eq!(written.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_self_mode_dumps_profile() {
        let fetcher = FakeFetcher::default().with(
            SnapshotKind::SelfProfile,
            json!({"displayName": "Jane Doe", "parentUnits": [500]}),
        );
        let (_dir, mut pipeline) = pipeline(fetcher);

        let dumped = pipeline.render(Mode::SelfInfo).await.unwrap();
        let parsed: Value = serde_json::from_slice(&dumped).unwrap();
        assert_eq!(parsed["displayName"], "Jane Doe");
        let text = String::from_utf8(dumped).unwrap();
        assert!(text.find("displayName").unwrap() < text.find("parentUnits").unwrap());
        assert_eq!(pipeline.fetcher().calls, vec![SnapshotKind::SelfProfile]);
    }

    #[tokio::test]
    async fn test_units_mode_reads_only_unit_snapshot() {
        let (_dir, mut pipeline) = pipeline(ward_fixture());
        let dumped = String::from_utf8(pipeline.render(Mode::Units).await.unwrap()).unwrap();
        assert!(dumped.contains("Main Ward"));
        assert_eq!(pipeline.fetcher().calls, vec![SnapshotKind::Units]);
    }

    #[tokio::test]
    async fn test_member_list_mode() {
        let fetcher = FakeFetcher::default().with(
            SnapshotKind::MemberList,
            json!([
                {"householdMember": {"household": {"uuid": "h1", "familyNameLocal": "Doe",
                    "directoryPreferredLocal": "Doe, Jane",
                    "address": {"addressLines": ["12 Elm St"]}}}},
                {"householdMember": {"household": {"uuid": "h1", "familyNameLocal": "Doe",
                    "directoryPreferredLocal": "Doe, Jane",
                    "address": {"addressLines": ["12 Elm St"]}}}}
            ]),
        );
        let (_dir, mut pipeline) = pipeline(fetcher);

        let csv = String::from_utf8(pipeline.render(Mode::MemberList).await.unwrap()).unwrap();
        assert_eq!(csv, "Name,Address,Full Name\nDoe,12 Elm St,\"Doe, Jane\"\n");
    }

    #[tokio::test]
    async fn test_mismatched_snapshot_shape_is_fatal() {
        let fetcher = ward_fixture().with(SnapshotKind::Households, json!({"unexpected": true}));
        let (_dir, mut pipeline) = pipeline(fetcher);

        let err = pipeline.render(Mode::Households).await.unwrap_err();
        assert!(err.to_string().contains("household directory"));
    }

    #[tokio::test]
    async fn test_live_fetcher_requires_username_before_network() {
        let prompt = |_: &str| -> Result<String> { panic!("prompt should not be called") };
        let mut fetcher = LiveFetcher::new(None, Some("secret".to_string()), &prompt).unwrap();

        let err = fetcher.fetch(SnapshotKind::SelfProfile).await.unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::MissingUsername));
        assert!(fetcher.signed_in_as().is_none());
    }
}
