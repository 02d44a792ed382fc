use std::fmt::{Display, Formatter};
use regex::{Regex, RegexBuilder};
use crate::common::category::{Category, Voltype};

/// The segment type a basename is expected to have at a given depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Category,
    VolumeSet,
    VolumeName,
}

impl Display for SegmentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SegmentKind::Category => "category",
            SegmentKind::VolumeSet => "volume set",
            SegmentKind::VolumeName => "volume name",
        })
    }
}

/// A volume-set directory or volume-set-level mirror file name, decomposed.
///
/// `ABC_1xxx_prelim_previews_md5.txt` -> (`ABC_1xxx`, `_prelim`, `_previews`, `_md5.txt`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolsetParts {
    pub volset_id: String,
    /// Lower-cased release suffix, possibly empty.
    pub release_suffix: String,
    pub voltype: Option<Voltype>,
    /// `_md5.txt`, `.tar.gz` or empty.
    pub extension: String,
}

/// A volume directory or volume-level mirror file name, decomposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolnameParts {
    pub volname: String,
    pub voltype: Option<Voltype>,
    pub extension: String,
}

/// Compiled classifiers for the three fixed segment types of a holdings path.
#[derive(Debug, Clone)]
pub struct SegmentPatterns {
    category: Regex,
    volset: Regex,
    volname: Regex,
}

const CATEGORY_PATTERN: &str = r"^(checksums-)?(archives-)?(volumes|calibrated|diagrams|metadata|previews)$";

const VOLSET_PATTERN: &str = r"^([A-Z][A-Z0-9]{1,5}_[0-9x]{3}x)(_v[0-9]+(?:\.[0-9]+){0,2}|_in_prep|_prelim|_peer_review|_lien_resolution|)(_volumes|_calibrated|_diagrams|_metadata|_previews|)(_md5\.txt|\.tar\.gz|)$";

const VOLNAME_PATTERN: &str = r"^([A-Z][A-Z0-9]{1,5}_[0-9]{4}[A-Z]?)(_volumes|_calibrated|_diagrams|_metadata|_previews|)(_md5\.txt|\.tar\.gz|)$";

fn build(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn voltype_of(suffix: &str) -> Option<Voltype> {
    suffix.strip_prefix('_').and_then(Voltype::parse)
}

impl SegmentPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            category: build(CATEGORY_PATTERN)?,
            volset: build(VOLSET_PATTERN)?,
            volname: build(VOLNAME_PATTERN)?,
        })
    }

    pub fn category(&self, name: &str) -> Option<Category> {
        let caps = self.category.captures(name)?;
        Some(Category::new(
            caps.get(1).is_some(),
            caps.get(2).is_some(),
            Voltype::parse(&caps[3])?,
        ))
    }

    pub fn volset(&self, name: &str) -> Option<VolsetParts> {
        let caps = self.volset.captures(name)?;
        Some(VolsetParts {
            volset_id: caps[1].to_string(),
            release_suffix: caps[2].to_ascii_lowercase(),
            voltype: voltype_of(&caps[3]),
            extension: caps[4].to_ascii_lowercase(),
        })
    }

    pub fn volname(&self, name: &str) -> Option<VolnameParts> {
        let caps = self.volname.captures(name)?;
        Some(VolnameParts {
            volname: caps[1].to_string(),
            voltype: voltype_of(&caps[2]),
            extension: caps[3].to_ascii_lowercase(),
        })
    }

    /// Whether `name` looks like a volume name, with nothing appended.
    pub fn is_volname(&self, name: &str) -> bool {
        self.volname(name)
            .is_some_and(|p| p.voltype.is_none() && p.extension.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> SegmentPatterns {
        SegmentPatterns::new().unwrap()
    }

    #[test]
    fn test_category_segment() {
        let p = patterns();
        assert_eq!(p.category("volumes"), Some(Category::plain(Voltype::Volumes)));
        assert_eq!(
            p.category("checksums-archives-Previews"),
            Some(Category::new(true, true, Voltype::Previews))
        );
        assert!(p.category("archives-checksums-volumes").is_none());
        assert!(p.category("documents").is_none());
    }

    #[test]
    fn test_volset_segment() {
        let p = patterns();
        let plain = p.volset("ABC_1xxx").unwrap();
        assert_eq!(plain.volset_id, "ABC_1xxx");
        assert_eq!(plain.release_suffix, "");
        assert!(plain.voltype.is_none());

        let prelim = p.volset("ABC_1xxx_PRELIM").unwrap();
        assert_eq!(prelim.release_suffix, "_prelim");

        let v = p.volset("ABC_1xxx_v2.1").unwrap();
        assert_eq!(v.release_suffix, "_v2.1");
        assert_eq!(v.extension, "");

        let mirror = p.volset("ABC_1xxx_v2.1_previews_md5.txt").unwrap();
        assert_eq!(mirror.release_suffix, "_v2.1");
        assert_eq!(mirror.voltype, Some(Voltype::Previews));
        assert_eq!(mirror.extension, "_md5.txt");

        let archive = p.volset("ABC_1xxx.tar.gz").unwrap();
        assert_eq!(archive.extension, ".tar.gz");

        assert!(p.volset("ABC_1001").is_none());
        assert!(p.volset("ABC_1xxx_bogus").is_none());
    }

    #[test]
    fn test_volname_segment() {
        let p = patterns();
        let v = p.volname("ABC_1001").unwrap();
        assert_eq!(v.volname, "ABC_1001");
        assert!(p.is_volname("ABC_1001"));
        assert!(p.is_volname("GO_0017a"));

        let m = p.volname("ABC_1001_previews_md5.txt").unwrap();
        assert_eq!(m.volname, "ABC_1001");
        assert_eq!(m.voltype, Some(Voltype::Previews));
        assert!(!p.is_volname("ABC_1001.tar.gz"));

        assert!(p.volname("ABC_1xxx").is_none());
        assert!(p.volname("DATA").is_none());
    }
}
