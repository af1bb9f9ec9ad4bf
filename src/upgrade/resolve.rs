use std::cmp::Ordering;

use tracing::{debug, warn};

use super::error::{Result, UpdateError};
use super::github::{Asset, Release};
use super::version::compare_versions;

pub const PROJECT_NAME: &str = "lalibela";
pub const CHECKSUMS_FILE: &str = "checksums.txt";
pub const SIGNATURE_FILE: &str = "checksums.txt.sig";

/// Host identity in release naming (`linux`/`darwin`/`windows`, `amd64`/`arm64`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detect the running host and map Rust target names onto release names.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn archive_ext(&self) -> &'static str {
        if self.is_windows() { ".zip" } else { ".tar.gz" }
    }

    /// Name of the executable entry inside a release archive.
    pub fn executable_name(&self) -> String {
        if self.is_windows() {
            format!("{}.exe", PROJECT_NAME)
        } else {
            PROJECT_NAME.to_string()
        }
    }
}

/// Archive names to look for, in preference order.
///
/// The `v`-prefixed tag form is canonical; the bare form is accepted only
/// when no canonical asset exists.
pub fn candidate_asset_names(tag: &str, platform: &Platform) -> Vec<String> {
    let trimmed = tag.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let ext = platform.archive_ext();
    vec![
        format!("{}_v{}_{}_{}{}", PROJECT_NAME, bare, platform.os, platform.arch, ext),
        format!("{}_{}_{}_{}{}", PROJECT_NAME, bare, platform.os, platform.arch, ext),
    ]
}

/// Everything needed to download and verify one release.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub current_version: String,
    pub target_version: String,
    pub archive: Asset,
    pub checksums: Asset,
    pub signature: Asset,
}

#[derive(Debug)]
pub enum Resolution {
    AlreadyLatest { latest: String },
    Update(UpdatePlan),
}

/// Decide whether `release` is an update for `current` and, if so, pick
/// its three required assets.
///
/// The version gate runs first, so an up-to-date host never needs the
/// release to carry assets for it.
pub fn resolve_plan(release: &Release, current: &str, platform: &Platform) -> Result<Resolution> {
    let tag = release.tag_name.trim();
    if tag.is_empty() {
        return Err(UpdateError::EmptyTag);
    }

    if compare_versions(current, tag)? != Ordering::Less {
        return Ok(Resolution::AlreadyLatest {
            latest: tag.to_string(),
        });
    }

    let candidates = candidate_asset_names(tag, platform);
    debug!(?candidates, "archive candidates");
    let present: Vec<&Asset> = candidates
        .iter()
        .filter_map(|want| find_asset(&release.assets, want))
        .collect();
    if present.len() > 1 {
        warn!(
            chosen = %present[0].name,
            ignored = %present[1].name,
            "release publishes the archive under both tag conventions"
        );
    }
    let archive = present.first().copied().cloned().ok_or_else(|| {
        UpdateError::AssetNotFound(format!(
            "no archive for {}/{} (tried {})",
            platform.os,
            platform.arch,
            candidates.join(", ")
        ))
    })?;

    let checksums = require_asset(&release.assets, CHECKSUMS_FILE)?;
    let signature = require_asset(&release.assets, SIGNATURE_FILE)?;

    Ok(Resolution::Update(UpdatePlan {
        current_version: current.trim().to_string(),
        target_version: tag.to_string(),
        archive,
        checksums,
        signature,
    }))
}

fn find_asset<'a>(assets: &'a [Asset], name: &str) -> Option<&'a Asset> {
    assets.iter().find(|a| a.name == name)
}

fn require_asset(assets: &[Asset], name: &str) -> Result<Asset> {
    find_asset(assets, name)
        .cloned()
        .ok_or_else(|| UpdateError::AssetNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            browser_download_url: format!("https://example.invalid/{name}"),
        }
    }

    fn release(tag: &str, names: &[&str]) -> Release {
        Release {
            tag_name: tag.to_string(),
            assets: names.iter().map(|n| asset(n)).collect(),
        }
    }

    fn linux() -> Platform {
        Platform::new("linux", "amd64")
    }

    #[test]
    fn candidates_prefer_v_prefixed_tag() {
        let names = candidate_asset_names("v1.4.0", &linux());
        assert_eq!(
            names,
            vec![
                "lalibela_v1.4.0_linux_amd64.tar.gz",
                "lalibela_1.4.0_linux_amd64.tar.gz"
            ]
        );
        // a bare tag yields the same list
        assert_eq!(candidate_asset_names("1.4.0", &linux()), names);
    }

    #[test]
    fn windows_candidates_use_zip() {
        let win = Platform::new("windows", "arm64");
        assert_eq!(
            candidate_asset_names("v2.0.0", &win)[0],
            "lalibela_v2.0.0_windows_arm64.zip"
        );
        assert_eq!(win.executable_name(), "lalibela.exe");
        assert_eq!(linux().executable_name(), "lalibela");
    }

    #[test]
    fn plan_picks_first_candidate_and_integrity_files() {
        let rel = release(
            "v1.4.0",
            &[
                "lalibela_1.4.0_linux_amd64.tar.gz",
                "lalibela_v1.4.0_linux_amd64.tar.gz",
                "lalibela_v1.4.0_darwin_arm64.tar.gz",
                CHECKSUMS_FILE,
                SIGNATURE_FILE,
            ],
        );
        let Resolution::Update(plan) = resolve_plan(&rel, "1.3.9", &linux()).unwrap() else {
            panic!("expected an update plan");
        };
        assert_eq!(plan.archive.name, "lalibela_v1.4.0_linux_amd64.tar.gz");
        assert_eq!(plan.checksums.name, CHECKSUMS_FILE);
        assert_eq!(plan.signature.name, SIGNATURE_FILE);
        assert_eq!(plan.current_version, "1.3.9");
        assert_eq!(plan.target_version, "v1.4.0");
    }

    #[test]
    fn plan_falls_back_to_bare_tag_name() {
        let rel = release(
            "v1.4.0",
            &["lalibela_1.4.0_linux_amd64.tar.gz", CHECKSUMS_FILE, SIGNATURE_FILE],
        );
        let Resolution::Update(plan) = resolve_plan(&rel, "1.3.9", &linux()).unwrap() else {
            panic!("expected an update plan");
        };
        assert_eq!(plan.archive.name, "lalibela_1.4.0_linux_amd64.tar.gz");
    }

    #[test]
    fn missing_required_assets_fail_closed() {
        let no_archive = release("v1.4.0", &[CHECKSUMS_FILE, SIGNATURE_FILE]);
        assert!(matches!(
            resolve_plan(&no_archive, "1.0.0", &linux()),
            Err(UpdateError::AssetNotFound(_))
        ));

        let no_sig = release(
            "v1.4.0",
            &["lalibela_v1.4.0_linux_amd64.tar.gz", CHECKSUMS_FILE],
        );
        match resolve_plan(&no_sig, "1.0.0", &linux()) {
            Err(UpdateError::AssetNotFound(name)) => assert_eq!(name, SIGNATURE_FILE),
            other => panic!("unexpected: {other:?}"),
        }

        let no_sums = release(
            "v1.4.0",
            &["lalibela_v1.4.0_linux_amd64.tar.gz", SIGNATURE_FILE],
        );
        match resolve_plan(&no_sums, "1.0.0", &linux()) {
            Err(UpdateError::AssetNotFound(name)) => assert_eq!(name, CHECKSUMS_FILE),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn not_newer_is_already_latest() {
        let rel = release("v1.4.0", &[]);
        for current in ["1.4.0", "v1.4.0", "1.5.0", "2.0.0-rc.1"] {
            match resolve_plan(&rel, current, &linux()).unwrap() {
                Resolution::AlreadyLatest { latest } => assert_eq!(latest, "v1.4.0"),
                Resolution::Update(_) => panic!("{current} should be up to date"),
            }
        }
    }

    #[test]
    fn empty_tag_is_rejected() {
        let rel = release("  ", &[CHECKSUMS_FILE]);
        assert!(matches!(
            resolve_plan(&rel, "1.0.0", &linux()),
            Err(UpdateError::EmptyTag)
        ));
    }

    #[test]
    fn invalid_current_version_is_rejected() {
        let rel = release("v1.4.0", &[]);
        assert!(matches!(
            resolve_plan(&rel, "dev", &linux()),
            Err(UpdateError::InvalidVersion(_))
        ));
    }
}
