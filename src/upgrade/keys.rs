//! Trusted release-signing key.
//!
//! The key is looked up fresh on every attempt, first match wins:
//! 1. `LALIBELA_UPDATE_PUBLIC_KEY_PATH`
//! 2. `public_key_path` from `config.toml`
//! 3. `LALIBELA_UPDATE_PUBLIC_KEY` (inline material)
//! 4. `<config dir>/public.key`
//!
//! Key material is an Ed25519 public key written as 64 hex characters or as
//! base64 of the 32 raw bytes.

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::VerifyingKey;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::{Result, UpdateError};

pub const PUBLIC_KEY_PATH_ENV: &str = "LALIBELA_UPDATE_PUBLIC_KEY_PATH";
pub const PUBLIC_KEY_ENV: &str = "LALIBELA_UPDATE_PUBLIC_KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedPublicKey(VerifyingKey);

impl TrustedPublicKey {
    pub fn from_material(text: &str) -> Result<Self> {
        let text = text.trim();
        let raw = if text.len() == 64 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
            hex::decode(text).map_err(|e| UpdateError::PublicKey(e.to_string()))?
        } else {
            general_purpose::STANDARD
                .decode(text)
                .map_err(|e| UpdateError::PublicKey(format!("not hex or base64: {e}")))?
        };
        let bytes: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            UpdateError::PublicKey(format!("expected 32 key bytes, got {}", v.len()))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|e| UpdateError::PublicKey(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            UpdateError::PublicKey(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_material(&text)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for TrustedPublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

/// The places a trusted key may come from.
#[derive(Debug, Clone, Default)]
pub struct KeySources {
    pub path_override: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub inline: Option<String>,
    pub default_path: PathBuf,
}

impl KeySources {
    /// Read the env overrides; `config_path` and `default_path` come from the caller.
    pub fn from_env(config_path: Option<PathBuf>, default_path: PathBuf) -> Self {
        let non_empty = |name: &str| {
            env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            path_override: non_empty(PUBLIC_KEY_PATH_ENV).map(PathBuf::from),
            config_path,
            inline: non_empty(PUBLIC_KEY_ENV),
            default_path,
        }
    }

    /// An explicitly named key file that is missing is an error; it never
    /// falls through to a lower-priority source.
    pub fn resolve(&self) -> Result<TrustedPublicKey> {
        if let Some(path) = self.path_override.as_ref().or(self.config_path.as_ref()) {
            debug!(path = %path.display(), "using configured update key");
            return TrustedPublicKey::from_file(path);
        }
        if let Some(inline) = &self.inline {
            debug!("using inline update key");
            return TrustedPublicKey::from_material(inline);
        }
        if self.default_path.is_file() {
            debug!(path = %self.default_path.display(), "using default update key");
            return TrustedPublicKey::from_file(&self.default_path);
        }
        Err(UpdateError::PublicKey(format!(
            "missing update public key (set {} or {}, or create {})",
            PUBLIC_KEY_PATH_ENV,
            PUBLIC_KEY_ENV,
            self.default_path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use serial_test::serial;
    use tempfile::tempdir;

    fn key(seed: u8) -> VerifyingKey {
        SigningKey::from_bytes(&[seed; 32]).verifying_key()
    }

    fn b64(seed: u8) -> String {
        general_purpose::STANDARD.encode(key(seed).to_bytes())
    }

    #[test]
    fn material_accepts_hex_and_base64() {
        let hexed = hex::encode(key(1).to_bytes());
        assert_eq!(
            TrustedPublicKey::from_material(&hexed).unwrap().verifying_key(),
            &key(1)
        );
        let padded = format!("  {}\n", b64(1));
        assert_eq!(
            TrustedPublicKey::from_material(&padded).unwrap().verifying_key(),
            &key(1)
        );
    }

    #[test]
    fn material_rejects_garbage_and_wrong_length() {
        let short_hex = hex::encode([0u8; 16]);
        for bad in ["", "not a key!", "AAAA", short_hex.as_str()] {
            assert!(
                matches!(TrustedPublicKey::from_material(bad), Err(UpdateError::PublicKey(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn path_override_beats_everything() {
        let td = tempdir().unwrap();
        let over = td.path().join("override.key");
        let dflt = td.path().join("public.key");
        fs::write(&over, b64(1)).unwrap();
        fs::write(&dflt, b64(2)).unwrap();

        let sources = KeySources {
            path_override: Some(over),
            config_path: Some(td.path().join("missing.key")),
            inline: Some(b64(3)),
            default_path: dflt,
        };
        assert_eq!(sources.resolve().unwrap().verifying_key(), &key(1));
    }

    #[test]
    fn inline_beats_default_file() {
        let td = tempdir().unwrap();
        let dflt = td.path().join("public.key");
        fs::write(&dflt, b64(2)).unwrap();

        let sources = KeySources {
            inline: Some(b64(3)),
            default_path: dflt.clone(),
            ..Default::default()
        };
        assert_eq!(sources.resolve().unwrap().verifying_key(), &key(3));

        let only_default = KeySources {
            default_path: dflt,
            ..Default::default()
        };
        assert_eq!(only_default.resolve().unwrap().verifying_key(), &key(2));
    }

    #[test]
    fn config_path_beats_inline() {
        let td = tempdir().unwrap();
        let cfg = td.path().join("cfg.key");
        fs::write(&cfg, hex::encode(key(4).to_bytes())).unwrap();
        let sources = KeySources {
            config_path: Some(cfg),
            inline: Some(b64(3)),
            default_path: td.path().join("public.key"),
            ..Default::default()
        };
        assert_eq!(sources.resolve().unwrap().verifying_key(), &key(4));
    }

    #[test]
    fn missing_explicit_path_does_not_fall_through() {
        let td = tempdir().unwrap();
        let dflt = td.path().join("public.key");
        fs::write(&dflt, b64(2)).unwrap();
        let sources = KeySources {
            path_override: Some(td.path().join("nope.key")),
            default_path: dflt,
            ..Default::default()
        };
        assert!(matches!(sources.resolve(), Err(UpdateError::PublicKey(_))));
    }

    #[test]
    fn nothing_configured_names_the_env_vars() {
        let td = tempdir().unwrap();
        let sources = KeySources {
            default_path: td.path().join("public.key"),
            ..Default::default()
        };
        match sources.resolve() {
            Err(UpdateError::PublicKey(msg)) => {
                assert!(msg.contains(PUBLIC_KEY_PATH_ENV));
                assert!(msg.contains(PUBLIC_KEY_ENV));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        let td = tempdir().unwrap();
        let over = td.path().join("env.key");
        fs::write(&over, b64(5)).unwrap();

        unsafe {
            env::set_var(PUBLIC_KEY_PATH_ENV, &over);
            env::set_var(PUBLIC_KEY_ENV, "   ");
        }
        let sources = KeySources::from_env(None, td.path().join("public.key"));
        unsafe {
            env::remove_var(PUBLIC_KEY_PATH_ENV);
            env::remove_var(PUBLIC_KEY_ENV);
        }

        assert_eq!(sources.path_override.as_deref(), Some(over.as_path()));
        assert!(sources.inline.is_none(), "blank inline key is ignored");
        assert_eq!(sources.resolve().unwrap().verifying_key(), &key(5));
    }
}
