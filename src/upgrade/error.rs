use std::path::PathBuf;

/// Convenient result alias for self-update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Everything that can stop an update attempt.
///
/// Any of these means the live executable was left untouched. Being already
/// on the latest release is not an error; see
/// [`UpdateOutcome::AlreadyLatest`](super::UpdateOutcome::AlreadyLatest).
#[derive(thiserror::Error, Debug)]
pub enum UpdateError {
    /// Transport-level failure talking to the release endpoint or an asset host.
    #[error("network request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The server answered with a non-success status.
    #[error("request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },
    /// The release metadata could not be decoded.
    #[error("malformed release metadata: {0}")]
    MalformedResponse(String),
    /// The latest release carries no version tag.
    #[error("latest release tag is empty")]
    EmptyTag,
    /// A required release asset is missing.
    #[error("release asset not found: {0}")]
    AssetNotFound(String),
    /// A download locator does not use https.
    #[error("insecure download URL: {0}")]
    InsecureUrl(String),
    /// The checksums manifest signature did not verify against the trusted key.
    #[error("signature verification failed for the checksums manifest")]
    SignatureInvalid,
    /// The archive digest has no manifest entry or does not match it.
    #[error("checksum verification failed for {asset}: {reason}")]
    ChecksumMismatch { asset: String, reason: String },
    /// The trusted public key is missing or unreadable.
    #[error("update public key: {0}")]
    PublicKey(String),
    #[error("unsupported archive format: {0}")]
    UnsupportedArchiveFormat(PathBuf),
    #[error("{archive} does not contain {binary}")]
    BinaryNotFoundInArchive { archive: PathBuf, binary: String },
    /// Any I/O failure while staging, extracting or replacing files.
    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid version {0:?}")]
    InvalidVersion(String),
}

impl UpdateError {
    /// Wrap an I/O error with a short description of what was being done.
    pub fn fs(context: impl Into<String>, source: std::io::Error) -> Self {
        UpdateError::Filesystem {
            context: context.into(),
            source,
        }
    }

    pub fn network(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        UpdateError::Network {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// Attach filesystem context to `io::Result`s, mirroring `anyhow::Context`.
pub(crate) trait IoContext<T> {
    fn fs_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn fs_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| UpdateError::fs(f(), e))
    }
}
