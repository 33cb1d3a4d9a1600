//! Host version compatibility checks.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A dotted numeric version with two to four components (`1.0`, `1.2.3`,
/// `1.2.3.4`). Missing trailing components compare as zero.
#[derive(Debug, Clone)]
pub struct HostVersion {
    parts: Vec<u64>,
}

impl HostVersion {
    fn padded(&self) -> [u64; 4] {
        let mut out = [0; 4];
        for (slot, part) in out.iter_mut().zip(&self.parts) {
            *slot = *part;
        }
        out
    }
}

impl FromStr for HostVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u64>().map_err(|_| format!("invalid version component '{p}'")))
            .collect::<Result<Vec<_>, _>>()?;

        if !(2..=4).contains(&parts.len()) {
            return Err(format!("version '{s}' must have 2 to 4 components"));
        }

        Ok(Self { parts })
    }
}

impl PartialEq for HostVersion {
    fn eq(&self, other: &Self) -> bool {
        self.padded() == other.padded()
    }
}

impl Eq for HostVersion {}

impl Ord for HostVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.padded().cmp(&other.padded())
    }
}

impl PartialOrd for HostVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.parts.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Whether a host at `current` satisfies a plugin requiring `required`.
///
/// Any parse failure on either side counts as incompatible.
pub fn is_version_compatible(required: &str, current: &str) -> bool {
    match (required.parse::<HostVersion>(), current.parse::<HostVersion>()) {
        (Ok(required), Ok(current)) => current >= required,
        _ => false,
    }
}
