use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::error::{IoContext, Result, UpdateError};
use super::resolve::Platform;

const DEFAULT_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The live path already holds the new binary.
    Replaced,
    /// A detached script will move the staged binary into place once this
    /// process exits.
    Scheduled { script: PathBuf },
}

/// How a verified binary is committed over the live executable.
pub trait ReplaceStrategy {
    fn name(&self) -> &'static str;

    fn replace(&self, staged: &Path, live: &Path) -> Result<ReplaceOutcome>;
}

/// Pick the strategy for `platform`. Windows locks running executables.
pub fn strategy_for(platform: &Platform) -> Box<dyn ReplaceStrategy> {
    if platform.is_windows() {
        Box::new(DeferredSwap::new())
    } else {
        Box::new(DirectAtomic)
    }
}

/// `<live>.new`, next to the live binary so the final rename stays on one filesystem.
pub fn staging_path(live: &Path) -> PathBuf {
    let mut s = OsString::from(live.as_os_str());
    s.push(".new");
    PathBuf::from(s)
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        warn!(path = %path.display(), "removing stale staged binary");
        fs::remove_file(path).fs_context(|| format!("removing {}", path.display()))?;
    }
    Ok(())
}

/// Copy `src` to `dst` with `mode` and flush it; `dst` is removed on failure.
fn copy_staged(src: &Path, dst: &Path, mode: u32) -> Result<()> {
    let res = (|| -> Result<()> {
        fs::copy(src, dst)
            .fs_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
        set_mode(dst, mode)?;
        fs::File::open(dst)
            .and_then(|f| f.sync_all())
            .fs_context(|| format!("flushing {}", dst.display()))
    })();
    if res.is_err() {
        let _ = fs::remove_file(dst);
    }
    res
}

#[cfg(unix)]
fn set_mode(p: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(p, fs::Permissions::from_mode(mode))
        .fs_context(|| format!("setting permissions on {}", p.display()))
}
#[cfg(not(unix))]
fn set_mode(_p: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Permission bits of the live binary, or `0o755` if they can't be read.
#[cfg(unix)]
fn live_mode(live: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(live)
        .map(|m| m.permissions().mode() & 0o7777)
        .ok()
        .filter(|m| *m != 0)
        .unwrap_or(DEFAULT_MODE)
}
#[cfg(not(unix))]
fn live_mode(_live: &Path) -> u32 {
    DEFAULT_MODE
}

/// Stage at `<live>.new` and rename it over the live path.
///
/// A process already running the old image keeps it until exit; the next
/// launch gets the new binary.
pub struct DirectAtomic;

impl ReplaceStrategy for DirectAtomic {
    fn name(&self) -> &'static str {
        "direct-atomic"
    }

    fn replace(&self, staged: &Path, live: &Path) -> Result<ReplaceOutcome> {
        let tmp = staging_path(live);
        remove_stale(&tmp)?;
        copy_staged(staged, &tmp, live_mode(live))?;

        if let Err(e) = fs::rename(&tmp, live) {
            let _ = fs::remove_file(&tmp);
            return Err(UpdateError::fs(
                format!("replacing {}", live.display()),
                e,
            ));
        }
        info!(path = %live.display(), "executable replaced");
        Ok(ReplaceOutcome::Replaced)
    }
}

/// Stage at `<live>.new` and leave the final move to a detached `cmd`
/// script that runs after this process has exited.
///
/// A crash between staging and the script's move leaves `<live>.new`
/// behind; the next attempt removes it before staging again.
pub struct DeferredSwap {
    script_dir: PathBuf,
}

impl Default for DeferredSwap {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredSwap {
    pub fn new() -> Self {
        Self::with_script_dir(std::env::temp_dir())
    }

    pub fn with_script_dir(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
        }
    }

    /// Stage the binary and write the swap script. Returns the script path.
    fn prepare(&self, staged: &Path, live: &Path) -> Result<PathBuf> {
        let tmp = staging_path(live);
        remove_stale(&tmp)?;
        copy_staged(staged, &tmp, DEFAULT_MODE)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let script = self
            .script_dir
            .join(format!("lalibela-update-{}.cmd", nanos));
        if let Err(e) = fs::write(&script, render_script(&tmp, live)) {
            let _ = fs::remove_file(&tmp);
            return Err(UpdateError::fs(
                format!("writing update script {}", script.display()),
                e,
            ));
        }
        debug!(script = %script.display(), "update script written");
        Ok(script)
    }
}

impl ReplaceStrategy for DeferredSwap {
    fn name(&self) -> &'static str {
        "deferred-swap"
    }

    fn replace(&self, staged: &Path, live: &Path) -> Result<ReplaceOutcome> {
        let script = self.prepare(staged, live)?;
        if let Err(e) = launch_detached(&script) {
            let _ = fs::remove_file(&script);
            let _ = fs::remove_file(staging_path(live));
            return Err(UpdateError::fs("starting update script", e));
        }
        info!(path = %live.display(), "executable replacement scheduled");
        Ok(ReplaceOutcome::Scheduled { script })
    }
}

/// Batch script: wait ~1s for the caller to exit, move, delete itself.
fn render_script(staged: &Path, live: &Path) -> String {
    format!(
        "@echo off\r\n\
         ping 127.0.0.1 -n 2 > nul\r\n\
         move /Y \"{}\" \"{}\" > nul\r\n\
         del \"%~f0\"\r\n",
        batch_escape(staged),
        batch_escape(live)
    )
}

// `%` is legal in Windows paths but expands inside batch files.
fn batch_escape(p: &Path) -> String {
    p.display().to_string().replace('%', "%%")
}

fn launch_detached(script: &Path) -> std::io::Result<()> {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", "", "/b", "cmd", "/c"])
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NO_WINDOW);
    }
    cmd.spawn().map(|_| ())
}
