use std::collections::HashSet;
use crate::archive::{Archive, ResolveError};
use crate::file::PdsFile;
use crate::iter::{normalize_sign, parent_of, Step};
use crate::utils::glob::expand_logical;

/// Walks the directories a dataset declares as neighbors of a start
/// directory.
///
/// Candidates come from the NEIGHBORS rules of the start node's bundle,
/// expanded over every holdings root. They are de-duplicated ignoring case
/// and ordered by sort key, then logical path. The start directory is always
/// one of the entries. Without a neighbor rule it is the only entry, so the
/// first `next` already returns `None`.
#[derive(Debug, Clone)]
pub struct DirIterator {
    /// `(sort key, logical path)`, sorted.
    entries: Vec<(String, String)>,
    index: usize,
    sign: isize,
    exhausted: bool,
}

impl DirIterator {
    pub fn new(archive: &Archive, node: &PdsFile) -> Result<Self, ResolveError> {
        let bundle = archive.bundle(node);
        let patterns = bundle.neighbors.first(&node.logical_path).unwrap_or_default();
        let roots = archive.holdings_paths();

        let sort_key = |logical: &str| {
            let name = logical.rsplit('/').next().unwrap_or_default();
            bundle.sort_key.first(name).unwrap_or_else(|| name.to_string())
        };

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        seen.insert(node.logical_path.to_lowercase());
        entries.push((sort_key(&node.logical_path), node.logical_path.clone()));

        for pattern in &patterns {
            for hit in expand_logical(&roots, pattern, true)? {
                if seen.insert(hit.logical_path.to_lowercase()) {
                    entries.push((sort_key(&hit.logical_path), hit.logical_path));
                }
            }
        }
        entries.sort();

        let index = entries
            .iter()
            .position(|(_, logical)| *logical == node.logical_path)
            .unwrap_or(0);
        Ok(Self { entries, index, sign: 1, exhausted: false })
    }

    /// A fresh iterator at the same position, moving in the direction of `sign`.
    pub fn copy(&self, sign: i32) -> Self {
        Self {
            sign: normalize_sign(sign),
            exhausted: false,
            ..self.clone()
        }
    }

    /// Logical path at the cursor.
    pub fn current(&self) -> &str {
        &self.entries[self.index].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Iterator for DirIterator {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.exhausted {
            return None;
        }
        let next = self.index as isize + self.sign;
        if next < 0 || next as usize >= self.entries.len() {
            self.exhausted = true;
            return None;
        }

        let previous = std::mem::replace(&mut self.index, next as usize);
        let previous = &self.entries[previous].1;
        let logical = self.entries[self.index].1.clone();
        let jump_level = u8::from(parent_of(&logical) != parent_of(previous));
        Some(Step::between(previous, logical, jump_level))
    }
}
