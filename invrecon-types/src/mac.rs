//! MAC address normalization.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OUI prefixes reported by virtual adapters and broken firmware. Addresses
/// with these prefixes never identify a device.
pub const MAC_PREFIX_BLACKLIST: &[&str] = &[
    "505054", "33506F", "009876", "000000", "00000C", "204153", "149120", "020054", "FEFFFF",
    "1AF920", "020820", "DEAD2C", "FEAD4D",
];

/// A MAC address stored as 12 upper-case hex digits without separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parses a MAC address, accepting `:`, `-` and `.` separators.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect::<String>()
            .to_uppercase();
        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidMac(s.to_string()));
        }
        Ok(Self(digits))
    }

    /// Returns the normalized form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the address belongs to a blacklisted vendor prefix.
    #[must_use]
    pub fn is_blacklisted(&self) -> bool {
        MAC_PREFIX_BLACKLIST
            .iter()
            .any(|prefix| self.0.starts_with(prefix))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}
