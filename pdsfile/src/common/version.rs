use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const IN_PREP_RANK: u32 = 990_100;
pub const PRELIMINARY_RANK: u32 = 990_200;
pub const PEER_REVIEW_RANK: u32 = 990_300;
pub const LIEN_RESOLUTION_RANK: u32 = 990_400;
pub const CURRENT_RANK: u32 = 999_999;

/// Defines errors that can occur when interpreting a release suffix.
//
// // 定义在解析版本后缀时可能发生的错误。
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VersionError {
    /// The suffix is not one of the known release states or version forms.
    //
    // // 后缀不是已知的发布状态或版本格式。
    #[error("Unrecognized version suffix: '{0}'")]
    Unrecognized(String),
}

/// The rank, human-readable message and normalized id of a release suffix.
///
/// Ranks are persisted into the cache's rank tables, so the mapping from
/// suffix to rank must never change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub rank: u32,
    pub message: String,
    pub version_id: String,
}

impl VersionInfo {
    /// The info of an unsuffixed volume set.
    pub fn current() -> Self {
        Self {
            rank: CURRENT_RANK,
            message: "Current version".to_string(),
            version_id: String::new(),
        }
    }

    pub fn is_current(&self) -> bool {
        self.rank == CURRENT_RANK
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::current()
    }
}

impl PartialOrd for VersionInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank.cmp(&other.rank)
    }
}

/// Maps a release suffix (`""`, `"_prelim"`, `"_v2.1"`, ...) to its [`VersionInfo`].
///
/// Numbered releases rank `N*10000 + M*100 + P`, below every named state;
/// the named states rank in_prep < prelim < peer_review < lien_resolution < current.
pub fn version_info(suffix: &str) -> Result<VersionInfo, VersionError> {
    let fixed = |rank: u32, message: &str| VersionInfo {
        rank,
        message: message.to_string(),
        version_id: String::new(),
    };

    match suffix {
        "" => Ok(VersionInfo::current()),
        "_in_prep" => Ok(fixed(IN_PREP_RANK, "In preparation")),
        "_prelim" => Ok(fixed(PRELIMINARY_RANK, "Preliminary release")),
        "_peer_review" => Ok(fixed(PEER_REVIEW_RANK, "In peer review")),
        "_lien_resolution" => Ok(fixed(LIEN_RESOLUTION_RANK, "In lien resolution")),
        other => parse_numbered(other).ok_or_else(|| VersionError::Unrecognized(other.to_string())),
    }
}

/// Parses `_vN`, `_vN.M` or `_vN.M.P`.
fn parse_numbered(suffix: &str) -> Option<VersionInfo> {
    let id = suffix.strip_prefix("_v")?;
    let parts: Vec<&str> = id.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut numbers = [0u32; 3];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        numbers[i] = part.parse().ok()?;
    }

    // 次版本号和补丁号各占两位；总排名必须低于 in_prep，才能保持全序
    let [major, minor, patch] = numbers;
    if minor > 99 || patch > 99 {
        return None;
    }
    let rank = major.checked_mul(10_000)?.checked_add(minor * 100 + patch)?;
    if rank >= IN_PREP_RANK {
        return None;
    }

    Some(VersionInfo {
        rank,
        message: format!("Version {} (superseded)", id),
        version_id: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_release_states() {
        assert_eq!(
            version_info("").unwrap(),
            VersionInfo {
                rank: 999_999,
                message: "Current version".to_string(),
                version_id: String::new()
            }
        );
        let in_prep = version_info("_in_prep").unwrap();
        assert_eq!(in_prep.rank, 990_100);
        assert_eq!(in_prep.message, "In preparation");
        assert_eq!(in_prep.version_id, "");
        assert_eq!(version_info("_prelim").unwrap().rank, 990_200);
        assert_eq!(version_info("_peer_review").unwrap().rank, 990_300);
        assert_eq!(version_info("_lien_resolution").unwrap().rank, 990_400);
    }

    #[test]
    fn test_numbered_versions() {
        let v2 = version_info("_v2").unwrap();
        assert_eq!(v2.rank, 20_000);
        assert_eq!(v2.message, "Version 2 (superseded)");
        assert_eq!(v2.version_id, "2");

        let v21 = version_info("_v2.1").unwrap();
        assert_eq!(v21.rank, 20_100);
        assert_eq!(v21.version_id, "2.1");

        let v213 = version_info("_v2.1.3").unwrap();
        assert_eq!(v213.rank, 20_103);
        assert_eq!(v213.version_id, "2.1.3");

        assert_eq!(version_info("_v99").unwrap().rank, 990_000);
        assert_eq!(version_info("_v99.0.99").unwrap().rank, 990_099);
    }

    #[test]
    fn test_unrecognized_suffixes() {
        for bad in ["_unknown", "_v", "_v2.", "_v2.1.3.4", "_vx", "_v99.1", "_v100", "_v1.100", "_v4294967295", "prelim"] {
            assert_eq!(
                version_info(bad),
                Err(VersionError::Unrecognized(bad.to_string())),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_total_order() {
        let suffixes = ["_v1", "_v1.0.1", "_v1.2", "_v98.99.99", "_in_prep", "_prelim", "_peer_review", "_lien_resolution", ""];
        let infos: Vec<VersionInfo> = suffixes.iter().map(|s| version_info(s).unwrap()).collect();
        for pair in infos.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should rank below {:?}", pair[0], pair[1]);
        }
        assert!(infos.last().unwrap().is_current());
    }
}
