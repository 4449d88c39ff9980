//! Snapshot identity and refcount record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::store::StoreError;

/// Identifier of one configuration generation.
///
/// Rendered as a zero-padded 5-character decimal string (`"00042"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(u16);

impl SnapshotId {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 5 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StoreError::InvalidSnapshotId(s.to_string()));
        }
        s.parse::<u32>()
            .ok()
            .and_then(|raw| u16::try_from(raw).ok())
            .map(Self)
            .ok_or_else(|| StoreError::InvalidSnapshotId(s.to_string()))
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.to_string()
    }
}

/// Refcounted generation marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub refcount: u32,
    pub current: bool,
}

impl Snapshot {
    pub fn new(id: SnapshotId) -> Self {
        Self {
            id,
            refcount: 0,
            current: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(SnapshotId::new(42).to_string(), "00042");
        assert_eq!(SnapshotId::new(65535).to_string(), "65535");
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!("00000".parse::<SnapshotId>().unwrap(), SnapshotId::new(0));
        assert_eq!("65535".parse::<SnapshotId>().unwrap(), SnapshotId::new(65535));
        assert!("65536".parse::<SnapshotId>().is_err());
        assert!("123".parse::<SnapshotId>().is_err());
        assert!("12a45".parse::<SnapshotId>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let snapshot = Snapshot {
            id: SnapshotId::new(7),
            refcount: 2,
            current: true,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["id"], "00007");
        let decoded: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
