//! Time values in fail2ban notation (`45s`, `10m`, `1h`, `1d`, `1w`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProvisionError;

const UNITS: &[(char, u64)] = &[
    ('w', 7 * 24 * 3600),
    ('d', 24 * 3600),
    ('h', 3600),
    ('m', 60),
    ('s', 1),
];

/// A positive span of time, stored in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTime", into = "String")]
pub struct PolicyDuration(u64);

impl PolicyDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn from_mins(mins: u64) -> Self {
        Self(mins * 60)
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PolicyDuration {
    /// Largest unit that divides the value exactly, so 600 renders `10m`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (suffix, secs) in UNITS {
            if self.0 >= *secs && self.0 % secs == 0 {
                return write!(f, "{}{}", self.0 / secs, suffix);
            }
        }
        write!(f, "{}s", self.0)
    }
}

impl FromStr for PolicyDuration {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.is_ascii() {
            return Err(ProvisionError::InvalidInput(format!(
                "invalid duration '{}'",
                s
            )));
        }

        let (num_part, unit) = match s.chars().last() {
            Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - 1], c.to_ascii_lowercase()),
            _ => (s, 's'),
        };
        let multiplier = UNITS
            .iter()
            .find(|(suffix, _)| *suffix == unit)
            .map(|(_, secs)| *secs)
            .ok_or_else(|| {
                ProvisionError::InvalidInput(format!(
                    "invalid duration '{}': unit must be s, m, h, d or w",
                    s
                ))
            })?;
        let value: u64 = num_part.parse().map_err(|_| {
            ProvisionError::InvalidInput(format!(
                "invalid duration '{}': expected a positive whole number",
                s
            ))
        })?;
        if value == 0 {
            return Err(ProvisionError::InvalidInput(format!(
                "invalid duration '{}': must be greater than zero",
                s
            )));
        }
        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| ProvisionError::InvalidInput(format!("duration '{}' overflows", s)))
    }
}

impl From<PolicyDuration> for String {
    fn from(d: PolicyDuration) -> Self {
        d.to_string()
    }
}

/// How long an address stays banned. `-1` is fail2ban's permanent marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTime", into = "String")]
pub enum BanTime {
    Finite(PolicyDuration),
    Permanent,
}

impl BanTime {
    pub const PERMANENT_MARKER: &'static str = "-1";

    pub fn is_permanent(&self) -> bool {
        matches!(self, BanTime::Permanent)
    }
}

impl fmt::Display for BanTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BanTime::Finite(d) => fmt::Display::fmt(d, f),
            BanTime::Permanent => f.write_str(Self::PERMANENT_MARKER),
        }
    }
}

impl FromStr for BanTime {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == Self::PERMANENT_MARKER {
            return Ok(BanTime::Permanent);
        }
        s.parse().map(BanTime::Finite)
    }
}

impl From<PolicyDuration> for BanTime {
    fn from(d: PolicyDuration) -> Self {
        BanTime::Finite(d)
    }
}

impl From<BanTime> for String {
    fn from(b: BanTime) -> Self {
        b.to_string()
    }
}

/// YAML may carry `bantime: -1` or `bantime: 600` as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Number(i64),
    Text(String),
}

impl RawTime {
    fn into_text(self) -> String {
        match self {
            RawTime::Number(n) => n.to_string(),
            RawTime::Text(s) => s,
        }
    }
}

impl TryFrom<RawTime> for PolicyDuration {
    type Error = ProvisionError;

    fn try_from(raw: RawTime) -> Result<Self, Self::Error> {
        raw.into_text().parse()
    }
}

impl TryFrom<RawTime> for BanTime {
    type Error = ProvisionError;

    fn try_from(raw: RawTime) -> Result<Self, Self::Error> {
        raw.into_text().parse()
    }
}
