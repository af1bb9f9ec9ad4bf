use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::paths::paths;
use crate::upgrade::{DEFAULT_API_BASE, DEFAULT_OWNER, DEFAULT_REPO};

/// Top-level configuration loaded from `config.toml`.
///
/// The file is optional; every key falls back to a built-in default.
///
/// Example TOML:
/// ```toml
/// [update]
/// owner = "naodEthiop"
/// repo = "lalibela-cli"
/// timeout_secs = 60
/// public_key_path = "keys/release.pub"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub update: UpdateSettings,
}

/// `[update]` table: where releases come from and how they are trusted.
///
/// A relative `public_key_path` is taken relative to the config directory.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdateSettings {
    pub owner: String,
    pub repo: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub public_key_path: Option<PathBuf>,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            public_key_path: None,
        }
    }
}

/// Load `config.toml` from the per-user config directory.
pub fn load_config() -> Result<Config> {
    load_config_from(&paths()?.config)
}

/// Load a config file; a missing file yields the defaults.
///
/// # Errors
/// - The file exists but cannot be read.
/// - The TOML is malformed or has wrongly typed values.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let cfg: Config = toml::from_str(&txt)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}
