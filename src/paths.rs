use anyhow::{Result, bail};
use std::{env, path::PathBuf};

#[derive(Clone)]
pub struct Paths {
    pub home: PathBuf,
    pub config: PathBuf,
    pub public_key: PathBuf,
}

/// Per-user configuration directory: `$XDG_CONFIG_HOME/lalibela`, falling
/// back to `$HOME/.config/lalibela`.
pub fn lalibela_home() -> Result<PathBuf> {
    let base = match env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(xdg) => PathBuf::from(xdg),
        None => match env::var_os("HOME").filter(|v| !v.is_empty()) {
            Some(home) => PathBuf::from(home).join(".config"),
            None => bail!("cannot locate config directory: neither XDG_CONFIG_HOME nor HOME is set"),
        },
    };
    Ok(base.join("lalibela"))
}

pub fn paths() -> Result<Paths> {
    let home = lalibela_home()?;
    Ok(Paths {
        config: home.join("config.toml"),
        public_key: home.join("public.key"),
        home,
    })
}
