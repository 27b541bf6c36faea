//! Common types used across the bridge

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a clock punch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PunchDirection {
    In,
    Out,
}

impl PunchDirection {
    /// Map the device's numeric punch state to a direction.
    ///
    /// The checkout family is 1 (check-out), 2 (break-out) and
    /// 5 (overtime-out); every other state counts as a check-in.
    pub fn from_device_code(code: u8) -> Self {
        match code {
            1 | 2 | 5 => PunchDirection::Out,
            _ => PunchDirection::In,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PunchDirection::In => "in",
            PunchDirection::Out => "out",
        }
    }
}

impl fmt::Display for PunchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a hardware address cannot be parsed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacParseError {
    #[error("hardware address must have 12 hex digits, got {0}")]
    BadLength(usize),
    #[error("hardware address contains a non-hex character")]
    BadCharacter,
}

/// A hardware (MAC) address, stored in normalized form:
/// uppercase hex, no separators.
///
/// Equality is therefore separator- and case-insensitive, which is what
/// matching against a neighbor-cache dump needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse a MAC from `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff`
    /// or bare `AABBCCDDEEFF` forms.
    pub fn parse(raw: &str) -> Result<Self, MacParseError> {
        let normalized: String = raw
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if normalized.len() != 12 {
            return Err(MacParseError::BadLength(normalized.len()));
        }
        if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MacParseError::BadCharacter);
        }
        Ok(MacAddress(normalized))
    }

    /// Normalized form: 12 uppercase hex digits, no separators.
    pub fn normalized(&self) -> &str {
        &self.0
    }

    /// Whether `candidate` (in any separator style) is this address.
    pub fn matches(&self, candidate: &str) -> bool {
        match MacAddress::parse(candidate) {
            Ok(other) => other == *self,
            Err(_) => false,
        }
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MacAddress::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = MacParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MacAddress::parse(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Re-insert colons for readability in logs
        let mut first = true;
        for pair in self.0.as_bytes().chunks(2) {
            if !first {
                f.write_str(":")?;
            }
            first = false;
            write!(f, "{}{}", pair[0] as char, pair[1] as char)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_direction_maps_checkout_family() {
        assert_eq!(PunchDirection::from_device_code(0), PunchDirection::In);
        assert_eq!(PunchDirection::from_device_code(1), PunchDirection::Out);
        assert_eq!(PunchDirection::from_device_code(2), PunchDirection::Out);
        assert_eq!(PunchDirection::from_device_code(3), PunchDirection::In);
        assert_eq!(PunchDirection::from_device_code(4), PunchDirection::In);
        assert_eq!(PunchDirection::from_device_code(5), PunchDirection::Out);
        assert_eq!(PunchDirection::from_device_code(255), PunchDirection::In);
    }

    #[test]
    fn mac_parse_accepts_all_separator_styles() {
        let canonical = MacAddress::parse("8C:AA:B5:D7:44:29").unwrap();
        assert_eq!(MacAddress::parse("8c-aa-b5-d7-44-29").unwrap(), canonical);
        assert_eq!(MacAddress::parse("8caab5d74429").unwrap(), canonical);
        assert_eq!(canonical.normalized(), "8CAAB5D74429");
        assert_eq!(canonical.to_string(), "8C:AA:B5:D7:44:29");
    }

    #[test]
    fn mac_parse_rejects_garbage() {
        assert_eq!(
            MacAddress::parse("8C:AA:B5"),
            Err(MacParseError::BadLength(6))
        );
        assert_eq!(
            MacAddress::parse("8C:AA:B5:D7:44:2G"),
            Err(MacParseError::BadCharacter)
        );
    }

    #[test]
    fn mac_matches_is_separator_insensitive() {
        let mac = MacAddress::parse("8C:AA:B5:D7:44:29").unwrap();
        assert!(mac.matches("8c-aa-b5-d7-44-29"));
        assert!(mac.matches("8caab5d74429"));
        assert!(!mac.matches("8c-aa-b5-d7-44-28"));
        assert!(!mac.matches("not a mac"));
    }

    proptest::proptest! {
        /// Any rendering of the same six bytes normalizes to the same
        /// address, and normalization is idempotent.
        #[test]
        fn mac_normalization_is_idempotent(bytes in proptest::collection::vec(0u8..=255, 6)) {
            let bare: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            let colon = bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(":");
            let dash = bytes
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join("-");

            let canonical = MacAddress::parse(&bare).unwrap();
            proptest::prop_assert_eq!(&MacAddress::parse(&colon).unwrap(), &canonical);
            proptest::prop_assert_eq!(&MacAddress::parse(&dash).unwrap(), &canonical);
            proptest::prop_assert_eq!(
                &MacAddress::parse(canonical.normalized()).unwrap(),
                &canonical
            );
        }
    }
}
