use std::fmt;

use serde::{Deserialize, Serialize};

/// Protocol version number negotiated on one side of a connection.
///
/// Versions are plain protocol numbers and compare numerically, so every
/// wire-format decision reduces to an "at least" check against one of the
/// release constants below.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub i32);

impl ProtocolVersion {
    pub const V1_12_2: ProtocolVersion = ProtocolVersion(340);
    /// First release with the capped text band for structured values.
    pub const V1_13: ProtocolVersion = ProtocolVersion(393);
    /// First release with nameless root tags in the binary tag stream.
    pub const V1_20_2: ProtocolVersion = ProtocolVersion(764);
    /// First release carrying structured values as binary tags.
    pub const V1_20_3: ProtocolVersion = ProtocolVersion(765);
    /// First release with a checksum byte on acknowledgment windows.
    pub const V1_21_5: ProtocolVersion = ProtocolVersion(770);

    pub fn protocol(self) -> i32 {
        self.0
    }

    pub fn no_less_than(self, other: ProtocolVersion) -> bool {
        self >= other
    }

    pub fn less_than(self, other: ProtocolVersion) -> bool {
        self < other
    }

    /// Release name for the named constants, if this is one of them.
    pub fn release_name(self) -> Option<&'static str> {
        match self {
            Self::V1_12_2 => Some("1.12.2"),
            Self::V1_13 => Some("1.13"),
            Self::V1_20_2 => Some("1.20.2"),
            Self::V1_20_3 => Some("1.20.3"),
            Self::V1_21_5 => Some("1.21.5"),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.release_name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<i32> for ProtocolVersion {
    fn from(protocol: i32) -> Self {
        ProtocolVersion(protocol)
    }
}
