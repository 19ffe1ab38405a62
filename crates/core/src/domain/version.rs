// Engine Version & Version Range

use crate::domain::error::ConfigError;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Sentinel spelling for the newest engine version
pub const LATEST: &str = "latest";

/// Detected (or declared) engine version
///
/// Dotted numeric tuples compare component-wise with the shorter tuple
/// zero-padded on the right, so `4.2` == `4.2.0.0`. `Latest` compares greater
/// than every finite version.
#[derive(Debug, Clone)]
pub enum Version {
    Finite(Vec<u64>),
    Latest,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(LATEST) {
            return Ok(Version::Latest);
        }
        if raw.is_empty() {
            return Err(ConfigError::InvalidVersion(raw.to_string()));
        }

        raw.split('.')
            .map(|part| part.trim().parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map(Version::Finite)
            .map_err(|_| ConfigError::InvalidVersion(raw.to_string()))
    }

    /// Last dotted numeric run in free text, e.g. `4.2.1.0` out of the
    /// MySQL-compatible banner `5.7.25-OceanBase_CE-v4.2.1.0`
    pub fn extract(text: &str) -> Option<Self> {
        text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .map(|token| token.trim_matches('.'))
            .filter(|token| token.contains('.'))
            .last()
            .and_then(|token| Version::parse(token).ok())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Latest, Version::Latest) => Ordering::Equal,
            (Version::Latest, Version::Finite(_)) => Ordering::Greater,
            (Version::Finite(_), Version::Latest) => Ordering::Less,
            (Version::Finite(a), Version::Finite(b)) => {
                let len = a.len().max(b.len());
                for i in 0..len {
                    let x = a.get(i).copied().unwrap_or(0);
                    let y = b.get(i).copied().unwrap_or(0);
                    match x.cmp(&y) {
                        Ordering::Equal => continue,
                        unequal => return unequal,
                    }
                }
                Ordering::Equal
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Latest => write!(f, "{}", LATEST),
            Version::Finite(parts) => {
                let joined: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", joined.join("."))
            }
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One end of a version range; `*` means unbounded in that direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    At(Version),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Unbounded => write!(f, "*"),
            Bound::At(v) => write!(f, "{}", v),
        }
    }
}

/// Closed version interval `[lower, upper]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Bound,
    pub upper: Bound,
}

impl VersionRange {
    /// Parse a bracketed range such as `[4.0.0.0, *]` or `[*, 3.2.4]`
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedRange {
            range: raw.to_string(),
            reason: reason.to_string(),
        };

        let inner = raw
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| malformed("range must be enclosed in '[' and ']'"))?;

        let bounds: Vec<&str> = inner.split(',').map(str::trim).collect();
        if bounds.len() != 2 {
            return Err(malformed("expected exactly two comma-separated bounds"));
        }

        let parse_bound = |b: &str| -> Result<Bound, ConfigError> {
            if b == "*" {
                Ok(Bound::Unbounded)
            } else {
                Version::parse(b)
                    .map(Bound::At)
                    .map_err(|_| malformed(&format!("invalid bound '{}'", b)))
            }
        };

        let lower = parse_bound(bounds[0])?;
        let upper = parse_bound(bounds[1])?;

        if let (Bound::At(lo), Bound::At(hi)) = (&lower, &upper) {
            if lo > hi {
                return Err(malformed("lower bound is greater than upper bound"));
            }
        }

        Ok(Self { lower, upper })
    }

    /// Unbounded on both ends
    pub fn any() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = match &self.lower {
            Bound::Unbounded => true,
            Bound::At(lo) => version >= lo,
        };
        let below_upper = match &self.upper {
            Bound::Unbounded => true,
            Bound::At(hi) => version <= hi,
        };
        above_lower && below_upper
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_zero_padded_comparison() {
        assert_eq!(v("4.2"), v("4.2.0.0"));
        assert!(v("4.2.1") > v("4.2"));
        assert!(v("3.10") > v("3.9.9.9"));
    }

    #[test]
    fn test_latest_beats_every_finite_version() {
        assert!(Version::Latest > v("999.999.999"));
        assert_eq!(v("latest"), Version::Latest);
        assert_eq!(v("LATEST").to_string(), "latest");
    }

    #[test]
    fn test_invalid_versions_rejected() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("4.x").is_err());
        assert!(Version::parse("4..2").is_err());
    }

    #[test]
    fn test_range_contains_inclusive_bounds() {
        let range = VersionRange::parse("[4.0.0.0, 4.2.1.0]").unwrap();
        assert!(range.contains(&v("4.0")));
        assert!(range.contains(&v("4.2.1")));
        assert!(range.contains(&v("4.1.5")));
        assert!(!range.contains(&v("3.9.9")));
        assert!(!range.contains(&v("4.2.1.1")));
        assert!(!range.contains(&Version::Latest));
    }

    #[test]
    fn test_wildcard_bounds() {
        let open_upper = VersionRange::parse("[4.0.0.0, *]").unwrap();
        assert!(open_upper.contains(&Version::Latest));
        assert!(!open_upper.contains(&v("3.2")));

        let open_lower = VersionRange::parse("[*, 3.2.4]").unwrap();
        assert!(open_lower.contains(&v("1.0")));
        assert!(!open_lower.contains(&v("3.2.4.1")));

        assert!(VersionRange::parse("[*,*]").unwrap().contains(&v("0.0.1")));
    }

    #[test]
    fn test_latest_as_upper_bound() {
        let range = VersionRange::parse("[4.0, latest]").unwrap();
        assert!(range.contains(&Version::Latest));
        assert!(range.contains(&v("100.0")));
    }

    #[test]
    fn test_malformed_ranges() {
        for raw in ["4.0, *", "[4.0]", "[4.0, 5.0, 6.0]", "[abc, *]", "[5.0, 4.0]", ""] {
            let err = VersionRange::parse(raw).unwrap_err();
            assert!(
                matches!(err, ConfigError::MalformedRange { .. }),
                "expected malformed range for {:?}, got {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_extract_from_banner() {
        assert_eq!(Version::extract("OceanBase 4.2.1.0 (r1)"), Some(v("4.2.1.0")));
        assert_eq!(
            Version::extract("5.7.25-OceanBase_CE-v4.2.1.0"),
            Some(v("4.2.1.0"))
        );
        assert_eq!(Version::extract("no digits here"), None);
    }

    #[test]
    fn test_display_round_trip() {
        let range = VersionRange::parse("[ 4.0 ,* ]").unwrap();
        assert_eq!(range.to_string(), "[4.0, *]");
    }
}
