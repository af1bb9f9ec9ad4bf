//! Self-update pipeline.
//!
//! resolve → download → verify → extract → replace, strictly in that order.
//! Any failure ends the attempt with the live executable untouched, and the
//! per-attempt work directory is removed on every exit path.

mod archive;
mod download;
mod error;
mod github;
mod keys;
mod replace;
mod resolve;
mod verify;
mod version;


use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use tempfile::TempDir;
use tracing::info;

use crate::config::load_config;
use crate::paths::paths;
use crate::progress::Status;

pub use archive::{ArchiveCodec, TarGz, Zip, codec_for, extract_executable};
pub use download::fetch;
pub use error::{Result, UpdateError};
pub use github::{
    Asset, DEFAULT_API_BASE, DEFAULT_OWNER, DEFAULT_REPO, GithubSource, Release, ReleaseSource,
    fetch_latest_release, gh_client,
};
pub use keys::{KeySources, PUBLIC_KEY_ENV, PUBLIC_KEY_PATH_ENV, TrustedPublicKey};
pub use replace::{
    DeferredSwap, DirectAtomic, ReplaceOutcome, ReplaceStrategy, staging_path, strategy_for,
};
pub use resolve::{
    CHECKSUMS_FILE, PROJECT_NAME, Platform, Resolution, SIGNATURE_FILE, UpdatePlan,
    candidate_asset_names, resolve_plan,
};
pub use verify::{
    VerifiedArchive, expected_checksum, sha256_file, verify_archive, verify_digest,
    verify_signature,
};
pub use version::{Version, compare_versions};

use error::IoContext;

/// Terminal result of an attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The newest release is not newer than the running version. Nothing
    /// was downloaded.
    AlreadyLatest { current: String, latest: String },
    /// A verified release was committed, or scheduled to be.
    Updated {
        from: String,
        to: String,
        replace: ReplaceOutcome,
    },
}

/// One configured update pipeline.
///
/// ```no_run
/// use lalibela::upgrade::{GithubSource, KeySources, Updater};
/// use std::time::Duration;
///
/// # fn demo() -> lalibela::upgrade::Result<()> {
/// let source = GithubSource::new(
///     "https://api.github.com",
///     "naodEthiop",
///     "lalibela-cli",
///     Duration::from_secs(30),
/// )?;
/// let keys = KeySources::from_env(None, "/home/me/.config/lalibela/public.key".into());
/// let exe = std::env::current_exe().unwrap();
/// Updater::new(source, env!("CARGO_PKG_VERSION"), keys).run(&exe)?;
/// # Ok(())
/// # }
/// ```
pub struct Updater<S> {
    source: S,
    current_version: String,
    platform: Platform,
    keys: KeySources,
    work_root: Option<PathBuf>,
    strategy: Option<Box<dyn ReplaceStrategy>>,
}

impl<S: ReleaseSource> Updater<S> {
    pub fn new(source: S, current_version: impl Into<String>, keys: KeySources) -> Self {
        Self {
            source,
            current_version: current_version.into(),
            platform: Platform::current(),
            keys,
            work_root: None,
            strategy: None,
        }
    }

    /// Resolve assets and the executable name for another host.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Create per-attempt work directories under `dir` instead of the system temp dir.
    pub fn work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = Some(dir.into());
        self
    }

    /// Override the strategy that would otherwise follow the platform.
    pub fn replace_strategy(mut self, strategy: Box<dyn ReplaceStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Run one attempt against the executable at `live`.
    pub fn run(&self, live: &Path) -> Result<UpdateOutcome> {
        let release = self.source.latest_release()?;
        let plan = match resolve_plan(&release, &self.current_version, &self.platform)? {
            Resolution::AlreadyLatest { latest } => {
                info!(current = %self.current_version, %latest, "already up to date");
                return Ok(UpdateOutcome::AlreadyLatest {
                    current: self.current_version.clone(),
                    latest,
                });
            }
            Resolution::Update(plan) => plan,
        };
        info!(
            from = %plan.current_version,
            to = %plan.target_version,
            archive = %plan.archive.name,
            "update available"
        );

        let key = self.keys.resolve()?;
        let work = self.scratch_dir()?;

        let archive_path = work.path().join(&plan.archive.name);
        let checksums_path = work.path().join(&plan.checksums.name);
        let signature_path = work.path().join(&plan.signature.name);
        for (asset, dest) in [
            (&plan.archive, &archive_path),
            (&plan.checksums, &checksums_path),
            (&plan.signature, &signature_path),
        ] {
            info!(asset = %asset.name, "downloading");
            self.source.download(asset, dest)?;
        }

        let verified = verify_archive(
            &archive_path,
            &plan.archive.name,
            &checksums_path,
            &signature_path,
            &key,
        )?;

        let extract_dir = work.path().join("extracted");
        fs::create_dir(&extract_dir)
            .fs_context(|| format!("creating {}", extract_dir.display()))?;
        let binary = extract_executable(&verified, &extract_dir, &self.platform.executable_name())?;

        let default_strategy;
        let strategy: &dyn ReplaceStrategy = match &self.strategy {
            Some(s) => s.as_ref(),
            None => {
                default_strategy = strategy_for(&self.platform);
                default_strategy.as_ref()
            }
        };
        info!(strategy = strategy.name(), live = %live.display(), "replacing executable");
        let replace = strategy.replace(&binary, live)?;

        Ok(UpdateOutcome::Updated {
            from: plan.current_version,
            to: plan.target_version,
            replace,
        })
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("lalibela-update-");
        match &self.work_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .fs_context(|| "creating update work directory")
    }
}

/// Upgrade the running `lalibela` binary to the latest release.
///
/// Process:
/// 1. Load `[update]` settings from `config.toml` (defaults if absent).
/// 2. Fetch the latest release and compare its tag with `CARGO_PKG_VERSION`.
///    - Not newer → print "already up to date" and exit.
/// 3. Download the platform archive, `checksums.txt` and `checksums.txt.sig`.
/// 4. Verify the manifest signature, then the archive checksum.
/// 5. Extract the binary and replace the running executable
///    (deferred until exit on Windows).
pub fn cmd_upgrade() -> anyhow::Result<()> {
    let p = paths()?;
    let settings = load_config()?.update;

    let live = env::current_exe().context("resolving executable path")?;
    let live = fs::canonicalize(&live).unwrap_or(live);

    let status = Status::start("checking for updates…");

    let config_key = settings
        .public_key_path
        .map(|k| if k.is_relative() { p.home.join(k) } else { k });
    let keys = KeySources::from_env(config_key, p.public_key.clone());

    let result = GithubSource::new(
        settings.api_base,
        settings.owner,
        settings.repo,
        Duration::from_secs(settings.timeout_secs),
    )
    .and_then(|source| Updater::new(source, env!("CARGO_PKG_VERSION"), keys).run(&live));

    match result {
        Ok(UpdateOutcome::AlreadyLatest { latest, .. }) => {
            status.ok(format!("already up to date ({})", latest));
        }
        Ok(UpdateOutcome::Updated {
            to,
            replace: ReplaceOutcome::Replaced,
            ..
        }) => {
            status.ok(format!("upgraded to {}", to));
        }
        Ok(UpdateOutcome::Updated {
            to,
            replace: ReplaceOutcome::Scheduled { .. },
            ..
        }) => {
            status.ok(format!(
                "upgrade to {} will complete once {} exits",
                to, PROJECT_NAME
            ));
        }
        Err(e) => {
            status.fail("upgrade failed");
            return Err(e).context("self-update aborted; the installed binary was not changed");
        }
    }
    Ok(())
}
