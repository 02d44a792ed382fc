//! Next/previous navigation across directories, files and index rows.

mod dir;
mod sibling;

pub use dir::DirIterator;
pub use sibling::{FileFilter, FileIterator, FileSource, RowIterator, RowSource, SiblingIterator, SiblingSource};

use serde::Serialize;

/// One move of a neighbor iterator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub logical_path: String,
    /// Path below the deepest directory shared with the previous step;
    /// the basename within one directory.
    pub display_path: String,
    /// 0 for a sibling in the same directory, 1 for a cousin in an adjacent one.
    pub jump_level: u8,
}

impl Step {
    /// A move from `previous` to `logical_path`. The display path is
    /// `logical_path` relative to the deepest directory both share.
    pub(crate) fn between(previous: &str, logical_path: String, jump_level: u8) -> Self {
        let shared = parent_of(previous)
            .split('/')
            .zip(parent_of(&logical_path).split('/'))
            .take_while(|(a, b)| !a.is_empty() && a == b)
            .count();
        let display_path = logical_path.split('/').skip(shared).collect::<Vec<_>>().join("/");
        Self { logical_path, display_path, jump_level }
    }
}

/// Parent part of a logical path.
pub(crate) fn parent_of(logical: &str) -> &str {
    logical.rsplit_once('/').map_or("", |(parent, _)| parent)
}

fn normalize_sign(sign: i32) -> isize {
    if sign < 0 { -1 } else { 1 }
}
