//! OSGi versions and version intervals.
//!
//! A [`Version`] is `major[.minor[.micro[.qualifier]]]`, ordered by the numeric
//! triple and then by the qualifier compared as a plain string. A
//! [`VersionRange`] is either a bare floor (`1.2.3`, unbounded above) or an
//! interval whose bracket characters carry the inclusivity of each end
//! (`[1.0.0,2.0.0)`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version '{text}': {reason}")]
    InvalidVersion { text: String, reason: String },
    #[error("invalid version range '{text}': {reason}")]
    InvalidRange { text: String, reason: String },
    #[error("inverted version range: low bound {low} is above high bound {high}")]
    InvertedRange { low: String, high: String },
    #[error("version range {0} contains no version")]
    EmptyRange(String),
}

/// An OSGi version.
///
/// Field order matters: the derived ordering compares major, minor, micro and
/// then the qualifier lexicographically.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

impl Version {
    /// `0.0.0`, the version assumed wherever none is declared.
    pub const EMPTY: Version = Version {
        major: 0,
        minor: 0,
        micro: 0,
        qualifier: String::new(),
    };

    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Attach a qualifier, validating its character set.
    pub fn with_qualifier(self, qualifier: &str) -> Result<Self, VersionError> {
        validate_qualifier(qualifier, qualifier)?;
        Ok(Self {
            qualifier: qualifier.to_owned(),
            ..self
        })
    }

    /// Parse a version. Surrounding whitespace is ignored and blank text
    /// yields [`Version::EMPTY`].
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::EMPTY);
        }

        let mut parts = trimmed.splitn(4, '.');
        let major = parse_component(trimmed, parts.next().unwrap_or_default())?;
        let minor = parts
            .next()
            .map(|p| parse_component(trimmed, p))
            .transpose()?
            .unwrap_or(0);
        let micro = parts
            .next()
            .map(|p| parse_component(trimmed, p))
            .transpose()?
            .unwrap_or(0);
        let qualifier = match parts.next() {
            Some(q) => {
                validate_qualifier(trimmed, q)?;
                q.to_owned()
            }
            None => String::new(),
        };

        Ok(Self {
            major,
            minor,
            micro,
            qualifier,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn micro(&self) -> u32 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

fn parse_component(text: &str, part: &str) -> Result<u32, VersionError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidVersion {
            text: text.to_owned(),
            reason: format!("'{part}' is not a non-negative integer"),
        });
    }
    part.parse().map_err(|_| VersionError::InvalidVersion {
        text: text.to_owned(),
        reason: format!("component '{part}' is out of range"),
    })
}

fn validate_qualifier(text: &str, qualifier: &str) -> Result<(), VersionError> {
    if qualifier.is_empty() {
        return Err(VersionError::InvalidVersion {
            text: text.to_owned(),
            reason: "empty qualifier".to_owned(),
        });
    }
    if let Some(bad) = qualifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(VersionError::InvalidVersion {
            text: text.to_owned(),
            reason: format!("invalid qualifier character '{bad}'"),
        });
    }
    Ok(())
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

/// A version interval.
///
/// An absent high bound means unbounded above; such a range always includes
/// its floor. Construction rejects a low bound above the high bound and an
/// interval with equal bounds unless both ends are inclusive, so every range
/// contains at least one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    low: Version,
    low_inclusive: bool,
    high: Option<Version>,
    high_inclusive: bool,
}

impl VersionRange {
    pub fn new(
        low: Version,
        low_inclusive: bool,
        high: Option<Version>,
        high_inclusive: bool,
    ) -> Result<Self, VersionError> {
        match &high {
            None if !low_inclusive => {
                return Err(VersionError::InvalidRange {
                    text: format!("({low},"),
                    reason: "a range without a high bound must include its floor".to_owned(),
                });
            }
            Some(h) if low > *h => {
                return Err(VersionError::InvertedRange {
                    low: low.to_string(),
                    high: h.to_string(),
                });
            }
            Some(h) if low == *h && !(low_inclusive && high_inclusive) => {
                return Err(VersionError::EmptyRange(format!(
                    "{}{low},{h}{}",
                    if low_inclusive { '[' } else { '(' },
                    if high_inclusive { ']' } else { ')' }
                )));
            }
            _ => {}
        }
        Ok(Self {
            low,
            low_inclusive,
            high_inclusive: high.is_some() && high_inclusive,
            high,
        })
    }

    /// `[low, infinity)`.
    pub fn at_least(low: Version) -> Self {
        Self {
            low,
            low_inclusive: true,
            high: None,
            high_inclusive: false,
        }
    }

    /// Parse a bare floor (`1.2`) or a bracketed interval (`[1.0,2.0)`).
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let trimmed = text.trim();
        if !trimmed.contains(',') {
            return Ok(Self::at_least(Version::parse(trimmed)?));
        }

        let invalid = |reason: &str| VersionError::InvalidRange {
            text: trimmed.to_owned(),
            reason: reason.to_owned(),
        };

        let low_inclusive = match trimmed.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(invalid("interval must start with '[' or '('")),
        };
        let high_inclusive = match trimmed.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(invalid("interval must end with ']' or ')'")),
        };

        // Both delimiters are single-byte, so slicing them off is safe.
        let inner = &trimmed[1..trimmed.len() - 1];
        let Some((low_text, high_text)) = inner.split_once(',') else {
            return Err(invalid("interval must contain a ','"));
        };
        if high_text.contains(',') {
            return Err(invalid("interval must contain exactly one ','"));
        }
        if low_text.trim().is_empty() || high_text.trim().is_empty() {
            return Err(invalid("interval bounds must not be empty"));
        }

        Self::new(
            Version::parse(low_text)?,
            low_inclusive,
            Some(Version::parse(high_text)?),
            high_inclusive,
        )
    }

    pub fn low(&self) -> &Version {
        &self.low
    }

    pub fn is_low_inclusive(&self) -> bool {
        self.low_inclusive
    }

    pub fn high(&self) -> Option<&Version> {
        self.high.as_ref()
    }

    pub fn is_high_inclusive(&self) -> bool {
        self.high_inclusive
    }

    /// Whether `version` satisfies both bounds.
    pub fn contains(&self, version: &Version) -> bool {
        let above_low = if self.low_inclusive {
            *version >= self.low
        } else {
            *version > self.low
        };
        let below_high = match &self.high {
            None => true,
            Some(high) if self.high_inclusive => version <= high,
            Some(high) => version < high,
        };
        above_low && below_high
    }

    /// Whether the two intervals share at least one version.
    pub fn intersects(&self, other: &Self) -> bool {
        !low_exceeds_high(
            &self.low,
            self.low_inclusive,
            other.high.as_ref(),
            other.high_inclusive,
        ) && !low_exceeds_high(
            &other.low,
            other.low_inclusive,
            self.high.as_ref(),
            self.high_inclusive,
        )
    }

    /// The overlap of the two intervals, or `None` when they are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }

        let (low, low_inclusive) = match self.low.cmp(&other.low) {
            Ordering::Greater => (self.low.clone(), self.low_inclusive),
            Ordering::Less => (other.low.clone(), other.low_inclusive),
            Ordering::Equal => (
                self.low.clone(),
                self.low_inclusive && other.low_inclusive,
            ),
        };

        let (high, high_inclusive) = match (&self.high, &other.high) {
            (None, None) => (None, false),
            (Some(h), None) => (Some(h.clone()), self.high_inclusive),
            (None, Some(h)) => (Some(h.clone()), other.high_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => (Some(a.clone()), self.high_inclusive),
                Ordering::Greater => (Some(b.clone()), other.high_inclusive),
                Ordering::Equal => (
                    Some(a.clone()),
                    self.high_inclusive && other.high_inclusive,
                ),
            },
        };

        Some(Self {
            low,
            low_inclusive,
            high,
            high_inclusive,
        })
    }
}

/// True when nothing can lie between a lower bound and an upper bound.
/// A missing upper bound is +infinity.
fn low_exceeds_high(
    low: &Version,
    low_inclusive: bool,
    high: Option<&Version>,
    high_inclusive: bool,
) -> bool {
    match high.map(|h| low.cmp(h)) {
        None | Some(Ordering::Less) => false,
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => !(low_inclusive && high_inclusive),
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::at_least(Version::EMPTY)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.high {
            None => write!(f, "{}", self.low),
            Some(high) => write!(
                f,
                "{}{},{}{}",
                if self.low_inclusive { '[' } else { '(' },
                self.low,
                high,
                if self.high_inclusive { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(value: VersionRange) -> Self {
        value.to_string()
    }
}
