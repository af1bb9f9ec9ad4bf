//! Two-stage trust chain for downloaded releases.
//!
//! Stage A checks the detached Ed25519 signature over `checksums.txt`
//! against the trusted key. Stage B hashes the archive with SHA-256 and
//! compares it with the manifest entry for that asset. Only when both pass
//! does a [`VerifiedArchive`] exist, and only a `VerifiedArchive` can be
//! extracted.

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::Signature;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{IoContext, Result, UpdateError};
use super::keys::TrustedPublicKey;

/// Stage A: does `signature` sign exactly `manifest` under `key`?
///
/// The signature may be the 64 raw bytes or their base64 text.
pub fn verify_signature(manifest: &[u8], signature: &[u8], key: &TrustedPublicKey) -> bool {
    match parse_signature(signature) {
        Some(sig) => key.verifying_key().verify_strict(manifest, &sig).is_ok(),
        None => false,
    }
}

fn parse_signature(raw: &[u8]) -> Option<Signature> {
    let bytes: [u8; 64] = match <[u8; 64]>::try_from(raw) {
        Ok(b) => b,
        Err(_) => {
            let text = std::str::from_utf8(raw).ok()?.trim();
            general_purpose::STANDARD
                .decode(text)
                .ok()?
                .try_into()
                .ok()?
        }
    };
    Some(Signature::from_bytes(&bytes))
}

/// Stage B: does `data` hash to `expected_hex`? Case-insensitive.
pub fn verify_digest(data: &[u8], expected_hex: &str) -> bool {
    digest_eq(&hex::encode(Sha256::digest(data)), expected_hex)
}

fn digest_eq(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = fs::File::open(path).fs_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut f, &mut hasher).fs_context(|| format!("hashing {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Digest recorded for `asset_name` in a `sha256sum`-style manifest.
///
/// Lines look like `<digest>  <name>` or `<digest> *<name>`. Blank lines,
/// `#` comments and single-field lines are skipped.
pub fn expected_checksum<'a>(manifest: &'a str, asset_name: &str) -> Option<&'a str> {
    manifest.lines().find_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            return None;
        }
        let name = fields[fields.len() - 1];
        let name = name.strip_prefix('*').unwrap_or(name);
        (name == asset_name).then_some(fields[0])
    })
}

/// A downloaded archive that passed both trust stages.
#[derive(Debug)]
pub struct VerifiedArchive {
    path: PathBuf,
}

impl VerifiedArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run stage A then stage B over files already on disk.
///
/// The manifest is not parsed at all unless its signature verifies.
pub fn verify_archive(
    archive: &Path,
    asset_name: &str,
    manifest_path: &Path,
    signature_path: &Path,
    key: &TrustedPublicKey,
) -> Result<VerifiedArchive> {
    let manifest = fs::read(manifest_path)
        .fs_context(|| format!("reading {}", manifest_path.display()))?;
    let signature = fs::read(signature_path)
        .fs_context(|| format!("reading {}", signature_path.display()))?;

    if !verify_signature(&manifest, &signature, key) {
        return Err(UpdateError::SignatureInvalid);
    }
    info!("checksums manifest signature verified");

    let mismatch = |reason: String| UpdateError::ChecksumMismatch {
        asset: asset_name.to_string(),
        reason,
    };
    let manifest = std::str::from_utf8(&manifest)
        .map_err(|_| mismatch("checksums manifest is not valid UTF-8".to_string()))?;
    let expected = expected_checksum(manifest, asset_name)
        .ok_or_else(|| mismatch("no entry in checksums manifest".to_string()))?;

    let actual = sha256_file(archive)?;
    debug!(%expected, %actual, "archive digest");
    if !digest_eq(&actual, expected) {
        return Err(mismatch(format!("expected {expected}, got {actual}")));
    }
    info!(asset = asset_name, "archive checksum verified");

    Ok(VerifiedArchive {
        path: archive.to_path_buf(),
    })
}
