//! Release version parsing and ordering.
//!
//! Accepts `MAJOR.MINOR.PATCH[-PRERELEASE]` with an optional leading `v`.
//! Prerelease labels compare as plain strings, and a release without a label
//! sorts above any prerelease of the same numeric triple.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::{Result, UpdateError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(raw: &str) -> Result<Self> {
        let invalid = || UpdateError::InvalidVersion(raw.to_string());

        let trimmed = raw.trim();
        let value = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if value.is_empty() {
            return Err(invalid());
        }

        let (core, pre) = match value.split_once('-') {
            Some((_, "")) => return Err(invalid()),
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (value, None),
        };

        let mut parts = core.split('.');
        let mut next = || -> Result<u64> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let (major, minor, patch) = (next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Version {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

/// Three-way comparison of two version strings.
///
/// Fails with [`UpdateError::InvalidVersion`] if either side does not parse.
pub fn compare_versions(current: &str, target: &str) -> Result<Ordering> {
    let current: Version = current.parse()?;
    let target: Version = target.parse()?;
    Ok(current.cmp(&target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare_versions(a, b).unwrap()
    }

    #[test]
    fn numeric_parts_compare_in_order() {
        assert_eq!(cmp("0.1.8", "v0.2.0"), Ordering::Less);
        assert_eq!(cmp("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(cmp("2.0.0", "1.99.99"), Ordering::Greater);
        assert_eq!(cmp("1.2.3", "1.2.10"), Ordering::Less);
    }

    #[test]
    fn leading_v_is_ignored() {
        assert_eq!(cmp("v1.4.0", "1.4.0"), Ordering::Equal);
        assert_eq!(cmp(" v1.4.0 ", "v1.4.0"), Ordering::Equal);
    }

    #[test]
    fn release_outranks_prerelease_of_same_triple() {
        assert_eq!(cmp("1.0.0", "1.0.0-rc.1"), Ordering::Greater);
        assert_eq!(cmp("1.0.0-rc.1", "1.0.0"), Ordering::Less);
        assert_eq!(cmp("0.9.0", "1.0.0-alpha"), Ordering::Less);
    }

    #[test]
    fn prerelease_labels_compare_lexicographically() {
        assert_eq!(cmp("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
        assert_eq!(cmp("1.0.0-rc.1", "1.0.0-rc.1"), Ordering::Equal);
        // plain string order, not numeric identifier order
        assert_eq!(cmp("1.0.0-rc.10", "1.0.0-rc.9"), Ordering::Less);
    }

    #[test]
    fn malformed_versions_are_rejected() {
        for bad in [
            "", "v", "1", "1.2", "1.2.x", "1.2.3.4", "1.2.3-", "1..3", "+1.2.3", "1.2.3+build",
            "dev",
        ] {
            let err = bad.parse::<Version>().unwrap_err();
            assert!(
                matches!(err, UpdateError::InvalidVersion(ref s) if s == bad),
                "expected InvalidVersion for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn either_side_invalid_fails_comparison() {
        assert!(matches!(
            compare_versions("dev", "1.0.0"),
            Err(UpdateError::InvalidVersion(_))
        ));
        assert!(matches!(
            compare_versions("1.0.0", "latest"),
            Err(UpdateError::InvalidVersion(_))
        ));
    }

    #[test]
    fn display_drops_the_v_prefix() {
        let v: Version = "v1.4.0-rc.2".parse().unwrap();
        assert_eq!(v.to_string(), "1.4.0-rc.2");
    }
}
