use std::fmt;
use std::sync::Arc;
use globset::GlobSet;
use tracing::warn;
use crate::archive::{Archive, ResolveError};
use crate::file::PdsFile;
use crate::iter::{normalize_sign, DirIterator, Step};
use crate::utils::glob::build_globset;

/// Lists the members of one container for a [`SiblingIterator`].
pub trait SiblingSource: Clone {
    /// Member names of `container`, in iteration order. `keep` is always
    /// included when given, so the start position exists.
    fn siblings(&self, archive: &Archive, container: &PdsFile, keep: Option<&str>) -> Vec<String>;
}

/// Which file names a [`FileIterator`] visits.
#[derive(Clone, Default)]
pub struct FileFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    predicate: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl FileFilter {
    /// Accepts every name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only names matching one of `patterns` (case-insensitive).
    pub fn include<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, globset::Error> {
        self.include = Some(build_globset(patterns, true)?);
        Ok(self)
    }

    /// Drops names matching one of `patterns` (case-insensitive).
    pub fn exclude<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, globset::Error> {
        self.exclude = Some(build_globset(patterns, true)?);
        Ok(self)
    }

    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.include.as_ref().is_none_or(|set| set.is_match(name))
            && !self.exclude.as_ref().is_some_and(|set| set.is_match(name))
            && self.predicate.as_ref().is_none_or(|f| f(name))
    }
}

impl fmt::Debug for FileFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileFilter")
            .field("include", &self.include.as_ref().map(GlobSet::len))
            .field("exclude", &self.exclude.as_ref().map(GlobSet::len))
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Files of a directory that pass a [`FileFilter`], ordered by sort key.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    pub filter: FileFilter,
}

impl SiblingSource for FileSource {
    fn siblings(&self, archive: &Archive, container: &PdsFile, keep: Option<&str>) -> Vec<String> {
        let bundle = archive.bundle(container);
        let mut keyed: Vec<(String, String)> = archive
            .childnames(container)
            .into_iter()
            .filter(|name| Some(name.as_str()) == keep || self.filter.accepts(name))
            .map(|name| (bundle.sort_key.first(&name).unwrap_or_else(|| name.clone()), name))
            .collect();
        if let Some(keep) = keep {
            if !keyed.iter().any(|(_, name)| name == keep) {
                let key = bundle.sort_key.first(keep).unwrap_or_else(|| keep.to_string());
                keyed.push((key, keep.to_string()));
            }
        }
        keyed.sort();
        keyed.into_iter().map(|(_, name)| name).collect()
    }
}

/// Rows of an index table, in shelf order.
#[derive(Debug, Clone, Default)]
pub struct RowSource;

impl SiblingSource for RowSource {
    fn siblings(&self, archive: &Archive, container: &PdsFile, keep: Option<&str>) -> Vec<String> {
        let mut rows = archive.childnames(container);
        if let Some(keep) = keep {
            if !rows.iter().any(|row| row == keep) {
                rows.push(keep.to_string());
            }
        }
        rows
    }
}

/// Steps through the members of a container, then jumps to the first (or
/// last) member of the next neighboring container.
///
/// Containers are visited in [`DirIterator`] order, so the jump follows the
/// dataset's neighbor rules. The step right after a jump carries
/// `jump_level` 1. The start node stays a member of its container even when
/// the filter rejects it, so a reversed copy can walk back to it. Once the
/// last container is used up the iterator keeps returning `None`.
#[derive(Debug, Clone)]
pub struct SiblingIterator<'a, S> {
    archive: &'a Archive,
    source: S,
    dirs: DirIterator,
    /// Container and basename of the start node.
    start: (String, String),
    container: String,
    siblings: Vec<String>,
    /// Logical path at the cursor.
    position: String,
    index: isize,
    sign: isize,
    jumped: bool,
    exhausted: bool,
}

/// Next/previous file in a directory and its neighbors.
pub type FileIterator<'a> = SiblingIterator<'a, FileSource>;

/// Next/previous row of an index table and its neighboring tables.
pub type RowIterator<'a> = SiblingIterator<'a, RowSource>;

impl<'a, S: SiblingSource> SiblingIterator<'a, S> {
    /// Positions a new iterator on `node` inside its parent.
    pub fn with_source(archive: &'a Archive, node: &PdsFile, source: S) -> Result<Self, ResolveError> {
        let container = archive
            .parent(node)?
            .ok_or_else(|| ResolveError::NotFound(node.logical_path.clone()))?;
        let dirs = DirIterator::new(archive, &container)?;
        let siblings = source.siblings(archive, &container, Some(&node.basename));
        let index = siblings
            .iter()
            .position(|name| *name == node.basename)
            .unwrap_or(0) as isize;

        Ok(Self {
            archive,
            source,
            dirs,
            start: (container.logical_path.clone(), node.basename.clone()),
            container: container.logical_path.clone(),
            siblings,
            position: node.logical_path.clone(),
            index,
            sign: 1,
            jumped: false,
            exhausted: false,
        })
    }

    /// A fresh iterator at the same position, moving in the direction of `sign`.
    pub fn copy(&self, sign: i32) -> Self {
        Self {
            dirs: self.dirs.copy(sign),
            sign: normalize_sign(sign),
            jumped: false,
            exhausted: false,
            ..self.clone()
        }
    }

    /// Logical path at the cursor.
    pub fn current(&self) -> &str {
        &self.position
    }

    // 跳到相邻目录；没有可用的目录时返回 false
    fn jump(&mut self) -> bool {
        while let Some(step) = self.dirs.next() {
            let container = match self.archive.from_logical_path(&step.logical_path, true) {
                Ok(container) => container,
                Err(e) => {
                    warn!("Skipping neighbor '{}': {}", step.logical_path, e);
                    continue;
                }
            };
            let keep = (step.logical_path == self.start.0).then_some(self.start.1.as_str());
            self.siblings = self.source.siblings(self.archive, &container, keep);
            self.container = step.logical_path;
            self.index = if self.sign > 0 { -1 } else { self.siblings.len() as isize };
            self.jumped = true;
            return true;
        }
        false
    }
}

impl<'a> SiblingIterator<'a, FileSource> {
    pub fn new(archive: &'a Archive, node: &PdsFile, filter: FileFilter) -> Result<Self, ResolveError> {
        Self::with_source(archive, node, FileSource { filter })
    }
}

impl<'a> SiblingIterator<'a, RowSource> {
    /// `node` must be a row of an index table.
    pub fn new(archive: &'a Archive, node: &PdsFile) -> Result<Self, ResolveError> {
        if !node.is_index_row {
            return Err(ResolveError::NotAnIndexTable(node.logical_path.clone()));
        }
        Self::with_source(archive, node, RowSource)
    }
}

impl<S: SiblingSource> Iterator for SiblingIterator<'_, S> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.exhausted {
            return None;
        }
        loop {
            let next = self.index + self.sign;
            if next >= 0 && (next as usize) < self.siblings.len() {
                self.index = next;
                let logical = format!("{}/{}", self.container, self.siblings[next as usize]);
                let jump_level = u8::from(self.jumped);
                self.jumped = false;
                let previous = std::mem::replace(&mut self.position, logical.clone());
                return Some(Step::between(&previous, logical, jump_level));
            }
            if !self.jump() {
                self.exhausted = true;
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use crate::archive::ArchiveConfig;
    use crate::rules::{DatasetRules, RuleEntry, RuleResult};

    fn archive(tmp: &TempDir) -> Archive {
        let holdings = tmp.path().join("d1/holdings");
        for (dir, files) in [
            ("volumes/ABC_1xxx/ABC_1001/DATA", vec!["A.IMG", "A.LBL", "B.IMG", "B.LBL"]),
            ("volumes/ABC_1xxx/ABC_1002/DATA", vec!["C.IMG", "C.LBL"]),
        ] {
            fs::create_dir_all(holdings.join(dir)).unwrap();
            for file in files {
                fs::write(holdings.join(dir).join(file), "x").unwrap();
            }
        }
        let mut config = ArchiveConfig::with_holdings([holdings]);
        config.case_insensitive = Some(false);
        config.datasets.push(DatasetRules {
            name: "ABC".to_string(),
            volset_pattern: "ABC_[0-9]xxx".to_string(),
            neighbors: vec![RuleEntry::Regex {
                pattern: r"volumes/ABC_1xxx/ABC_\d{4}/DATA".to_string(),
                ignore_case: true,
                result: RuleResult::Many(vec!["volumes/ABC_1xxx/ABC_*/DATA".to_string()]),
            }],
            ..Default::default()
        });
        Archive::new(config).unwrap()
    }

    #[test]
    fn test_filter() {
        let filter = FileFilter::new()
            .include(&["*.img"])
            .unwrap()
            .predicate(|name| !name.starts_with('B'));
        assert!(filter.accepts("A.IMG"));
        assert!(!filter.accepts("A.LBL"));
        assert!(!filter.accepts("B.IMG"));

        let filter = FileFilter::new().exclude(&["*.LBL"]).unwrap();
        assert!(filter.accepts("A.IMG"));
        assert!(!filter.accepts("a.lbl"));
    }

    #[test]
    fn test_file_iterator_jumps_to_cousins() {
        let tmp = TempDir::new().unwrap();
        let archive = archive(&tmp);
        let node = archive
            .from_logical_path("volumes/ABC_1xxx/ABC_1001/DATA/A.IMG", true)
            .unwrap();
        let filter = FileFilter::new().include(&["*.IMG"]).unwrap();

        let steps: Vec<Step> = archive.file_iter(&node, filter).unwrap().collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].logical_path, "volumes/ABC_1xxx/ABC_1001/DATA/B.IMG");
        assert_eq!(steps[0].jump_level, 0);
        assert_eq!(steps[0].display_path, "B.IMG");
        assert_eq!(steps[1].logical_path, "volumes/ABC_1xxx/ABC_1002/DATA/C.IMG");
        assert_eq!(steps[1].jump_level, 1);
        assert_eq!(steps[1].display_path, "ABC_1002/DATA/C.IMG");
    }

    #[test]
    fn test_reversed_copy_retraces() {
        let tmp = TempDir::new().unwrap();
        let archive = archive(&tmp);
        let node = archive
            .from_logical_path("volumes/ABC_1xxx/ABC_1001/DATA/A.LBL", true)
            .unwrap();

        let mut forward = archive.file_iter(&node, FileFilter::new()).unwrap();
        let mut visited = vec![forward.current().to_string()];
        for _ in 0..3 {
            visited.push(forward.next().unwrap().logical_path);
        }
        assert_eq!(forward.current(), "volumes/ABC_1xxx/ABC_1002/DATA/C.IMG");

        let back: Vec<String> = forward.copy(-1).take(3).map(|s| s.logical_path).collect();
        let mut expected = visited[..3].to_vec();
        expected.reverse();
        assert_eq!(back, expected);
    }

    #[test]
    fn test_row_iterator_needs_a_row() {
        let tmp = TempDir::new().unwrap();
        let archive = archive(&tmp);
        let node = archive
            .from_logical_path("volumes/ABC_1xxx/ABC_1001/DATA/A.IMG", true)
            .unwrap();
        assert!(matches!(
            archive.row_iter(&node),
            Err(ResolveError::NotAnIndexTable(_))
        ));
    }
}
