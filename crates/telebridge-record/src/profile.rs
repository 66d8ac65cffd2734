//! Names bound to the four instrument slots.
//!
//! The wire layout never changes; the profile only decides how the slots are
//! labelled in log headers and bus payloads. It is chosen once at startup.

use std::fmt;
use std::str::FromStr;

/// Slot names used by RE-Mote class nodes.
pub const REMOTE_FIELD_NAMES: [&str; 4] = ["core_temp", "ADC1", "ADC2", "ADC3"];

/// Slot names used by Z1 class nodes.
pub const Z1_FIELD_NAMES: [&str; 4] = ["temperature", "x_axis", "y_axis", "z_axis"];

/// Static mapping from `field_1..field_4` to human-readable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldNameProfile {
    /// Core temperature plus three ADC channels.
    #[default]
    Remote,
    /// Temperature plus a three-axis accelerometer.
    Z1,
}

impl FieldNameProfile {
    /// Names for `field_1..field_4`, in slot order.
    pub fn field_names(self) -> [&'static str; 4] {
        match self {
            FieldNameProfile::Remote => REMOTE_FIELD_NAMES,
            FieldNameProfile::Z1 => Z1_FIELD_NAMES,
        }
    }

    /// Short identifier accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            FieldNameProfile::Remote => "remote",
            FieldNameProfile::Z1 => "z1",
        }
    }
}

impl fmt::Display for FieldNameProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown profile name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field name profile: {0} (expected \"remote\" or \"z1\")")]
pub struct UnknownProfile(pub String);

impl FromStr for FieldNameProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "re-mote" => Ok(FieldNameProfile::Remote),
            "z1" => Ok(FieldNameProfile::Z1),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_remote() {
        assert_eq!(FieldNameProfile::default(), FieldNameProfile::Remote);
        assert_eq!(
            FieldNameProfile::default().field_names(),
            ["core_temp", "ADC1", "ADC2", "ADC3"]
        );
    }

    #[test]
    fn z1_names() {
        assert_eq!(
            FieldNameProfile::Z1.field_names(),
            ["temperature", "x_axis", "y_axis", "z_axis"]
        );
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Z1".parse::<FieldNameProfile>(), Ok(FieldNameProfile::Z1));
        assert_eq!(
            " remote ".parse::<FieldNameProfile>(),
            Ok(FieldNameProfile::Remote)
        );
        assert!("sky".parse::<FieldNameProfile>().is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for profile in [FieldNameProfile::Remote, FieldNameProfile::Z1] {
            assert_eq!(profile.to_string().parse::<FieldNameProfile>(), Ok(profile));
        }
    }
}
