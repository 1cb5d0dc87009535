//! Supported host revisions

use std::fmt;

use crate::protocol::layout::ProtocolLayout;

pub mod v1_16_r3;
pub mod v1_17_r1;
pub mod v1_20_r3;
pub mod v1_21_r2;
pub mod v1_21_r3;

/// Closed set of host revisions this crate can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V1_16R3,
    V1_17R1,
    V1_20R3,
    V1_21R2,
    V1_21R3,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 5] = [
        ProtocolVersion::V1_16R3,
        ProtocolVersion::V1_17R1,
        ProtocolVersion::V1_20R3,
        ProtocolVersion::V1_21R2,
        ProtocolVersion::V1_21R3,
    ];

    /// Field-layout table for this revision
    pub fn layout(self) -> &'static ProtocolLayout {
        match self {
            ProtocolVersion::V1_16R3 => &v1_16_r3::LAYOUT,
            ProtocolVersion::V1_17R1 => &v1_17_r1::LAYOUT,
            ProtocolVersion::V1_20R3 => &v1_20_r3::LAYOUT,
            ProtocolVersion::V1_21R2 => &v1_21_r2::LAYOUT,
            ProtocolVersion::V1_21R3 => &v1_21_r3::LAYOUT,
        }
    }

    /// Match a revision tag such as `v1_21_R3` (case-insensitive)
    pub fn from_revision(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.layout().revision.eq_ignore_ascii_case(tag))
    }

    /// Match a game version such as `1.21.4`
    pub fn from_game_version(version: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.layout().game_versions.iter().any(|g| *g == version))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.layout().revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::layout::DestroyMode;
    use std::collections::HashSet;

    #[test]
    fn test_revision_lookup() {
        assert_eq!(ProtocolVersion::from_revision("v1_21_R3"), Some(ProtocolVersion::V1_21R3));
        assert_eq!(ProtocolVersion::from_revision("V1_16_r3"), Some(ProtocolVersion::V1_16R3));
        assert_eq!(ProtocolVersion::from_revision("v1_8_R3"), None);
    }

    #[test]
    fn test_game_version_lookup() {
        assert_eq!(ProtocolVersion::from_game_version("1.16.5"), Some(ProtocolVersion::V1_16R3));
        assert_eq!(ProtocolVersion::from_game_version("1.20.4"), Some(ProtocolVersion::V1_20R3));
        assert_eq!(ProtocolVersion::from_game_version("1.21.3"), Some(ProtocolVersion::V1_21R2));
        assert_eq!(ProtocolVersion::from_game_version("1.12.2"), None);
    }

    #[test]
    fn test_game_versions_not_claimed_twice() {
        let mut seen = HashSet::new();
        for version in ProtocolVersion::ALL {
            for game in version.layout().game_versions {
                assert!(seen.insert(*game), "{} claimed twice", game);
            }
        }
    }

    #[test]
    fn test_only_1_17_destroys_singly() {
        for version in ProtocolVersion::ALL {
            let single = matches!(version.layout().destroy, DestroyMode::Single { .. });
            assert_eq!(single, version == ProtocolVersion::V1_17R1);
        }
    }

    #[test]
    fn test_display_is_revision_tag() {
        assert_eq!(ProtocolVersion::V1_20R3.to_string(), "v1_20_R3");
    }
}
