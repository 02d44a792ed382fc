use std::fs;
use std::path::{Path, PathBuf};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

fn has_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

fn segment_matcher(segment: &str, case_insensitive: bool) -> Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(segment)
        .case_insensitive(case_insensitive)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// A path found by [`expand_logical`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobHit {
    pub holdings_root: PathBuf,
    pub abspath: PathBuf,
    pub logical_path: String,
}

/// Expands a logical glob pattern under every holdings root.
///
/// Matching is done one segment at a time, so `*` never crosses a `/`.
/// Literal segments are looked up directly; when `case_insensitive` is set a
/// literal that is missing verbatim is matched against the listing.
/// Hits are ordered by logical path, then by root order.
pub fn expand_logical(roots: &[PathBuf], pattern: &str, case_insensitive: bool) -> Result<Vec<GlobHit>, globset::Error> {
    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();

    let mut matchers = Vec::with_capacity(segments.len());
    for segment in &segments {
        matchers.push(if has_meta(segment) {
            Some(segment_matcher(segment, case_insensitive)?)
        } else {
            None
        });
    }

    let mut hits = Vec::new();
    for root in roots {
        let mut frontier: Vec<(PathBuf, Vec<String>)> = vec![(root.clone(), Vec::new())];
        for (segment, matcher) in segments.iter().zip(&matchers) {
            let mut next = Vec::new();
            for (dir, logical) in &frontier {
                for name in matching_children(dir, segment, matcher.as_ref(), case_insensitive) {
                    let mut parts = logical.clone();
                    parts.push(name.clone());
                    next.push((dir.join(&name), parts));
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        hits.extend(frontier.into_iter().map(|(abspath, parts)| GlobHit {
            holdings_root: root.clone(),
            abspath,
            logical_path: parts.join("/"),
        }));
    }

    // 稳定排序保留根目录顺序
    hits.sort_by(|a, b| a.logical_path.cmp(&b.logical_path));
    Ok(hits)
}

fn matching_children(dir: &Path, segment: &str, matcher: Option<&GlobMatcher>, case_insensitive: bool) -> Vec<String> {
    match matcher {
        None => {
            if dir.join(segment).symlink_metadata().is_ok() {
                return vec![segment.to_string()];
            }
            if !case_insensitive {
                return Vec::new();
            }
            list_names(dir)
                .into_iter()
                .filter(|name| name.eq_ignore_ascii_case(segment))
                .take(1)
                .collect()
        }
        Some(matcher) => {
            let mut names: Vec<String> = list_names(dir)
                .into_iter()
                .filter(|name| matcher.is_match(name))
                .collect();
            names.sort();
            names
        }
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Compiles basename patterns into one set. An empty list gives an empty set.
pub fn build_globset<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern.as_ref())
                .case_insensitive(case_insensitive)
                .literal_separator(true)
                .build()?,
        );
    }
    builder.build()
}

/// Whether `pattern` contains glob metacharacters.
pub fn is_pattern(pattern: &str) -> bool {
    Glob::new(pattern).is_ok() && has_meta(pattern)
}
