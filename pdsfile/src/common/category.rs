use std::fmt::{Display, Formatter};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::common::constants::{ARCHIVES_PREFIX, CHECKSUMS_PREFIX};

/// The content type of a holdings category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voltype {
    Volumes,
    Calibrated,
    Diagrams,
    Metadata,
    Previews,
}

impl Voltype {
    pub const ALL: [Voltype; 5] = [
        Voltype::Volumes,
        Voltype::Calibrated,
        Voltype::Diagrams,
        Voltype::Metadata,
        Voltype::Previews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Voltype::Volumes => "volumes",
            Voltype::Calibrated => "calibrated",
            Voltype::Diagrams => "diagrams",
            Voltype::Metadata => "metadata",
            Voltype::Previews => "previews",
        }
    }

    /// Suffix used in mirror file names, e.g. `ABC_1001_previews_md5.txt`.
    /// Raw volumes carry no suffix.
    pub fn file_suffix(&self) -> String {
        match self {
            Voltype::Volumes => String::new(),
            other => format!("_{}", other.as_str()),
        }
    }

    /// Case-insensitive parse of a bare voltype name.
    pub fn parse(name: &str) -> Option<Voltype> {
        Voltype::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(name))
    }
}

impl Display for Voltype {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A holdings category: a voltype optionally mirrored as checksums and/or archives.
///
/// - `volumes`
/// - `archives-previews`
/// - `checksums-archives-metadata`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub checksums: bool,
    pub archives: bool,
    pub voltype: Voltype,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid category name: '{0}'")]
pub struct CategoryParseError(pub String);

impl Category {
    pub fn new(checksums: bool, archives: bool, voltype: Voltype) -> Self {
        Self { checksums, archives, voltype }
    }

    pub fn plain(voltype: Voltype) -> Self {
        Self::new(false, false, voltype)
    }

    /// Parses a category directory name, ignoring case.
    pub fn parse(name: &str) -> Option<Category> {
        let lower = name.to_ascii_lowercase();
        let mut rest = lower.as_str();
        let checksums = match rest.strip_prefix(CHECKSUMS_PREFIX) {
            Some(r) => {
                rest = r;
                true
            }
            None => false,
        };
        let archives = match rest.strip_prefix(ARCHIVES_PREFIX) {
            Some(r) => {
                rest = r;
                true
            }
            None => false,
        };
        Voltype::parse(rest).map(|voltype| Category { checksums, archives, voltype })
    }

    /// Directory name under a holdings root.
    pub fn dir_name(&self) -> String {
        format!(
            "{}{}{}",
            if self.checksums { CHECKSUMS_PREFIX } else { "" },
            if self.archives { ARCHIVES_PREFIX } else { "" },
            self.voltype.as_str()
        )
    }

    pub fn is_mirror(&self) -> bool {
        self.checksums || self.archives
    }

    pub fn with_checksums(self) -> Self {
        Self { checksums: true, ..self }
    }

    pub fn with_archives(self) -> Self {
        Self { archives: true, ..self }
    }

    /// The category with both mirror flags cleared.
    pub fn unmirrored(self) -> Self {
        Self::plain(self.voltype)
    }

    /// Every category, plain ones first, then `archives-`, `checksums-`
    /// and `checksums-archives-`. Preload walks categories in this order.
    pub fn preload_order() -> Vec<Category> {
        let mut order = Vec::with_capacity(20);
        for (checksums, archives) in [(false, false), (false, true), (true, false), (true, true)] {
            for voltype in Voltype::ALL {
                order.push(Category::new(checksums, archives, voltype));
            }
        }
        order
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dir_name())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse(s).ok_or_else(|| CategoryParseError(s.to_string()))
    }
}
