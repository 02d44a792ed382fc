use std::fmt::Debug;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use crate::common::constants::HOLDINGS_DIR;

/// Normalizes a logical path: forward slashes, no empty or `.` segments,
/// no leading or trailing slash.
///
/// Examples:
/// - "volumes/ABC_1xxx/" -> "volumes/ABC_1xxx"
/// - "/volumes//ABC_1xxx" -> "volumes/ABC_1xxx"
/// - "volumes\\ABC_1xxx" -> "volumes/ABC_1xxx"
pub fn normalize_logical(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Dotfiles are never part of the holdings tree.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Joins a logical path onto a directory.
pub fn join_logical(root: &Path, logical: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in logical.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Splits an absolute path at its `holdings` marker segment.
///
/// Returns `(disk_root, holdings_root, logical_path)`, where `disk_root` is the
/// directory containing `holdings/`.
pub fn split_holdings(path: &Path) -> Option<(PathBuf, PathBuf, String)> {
    let mut disk_root = PathBuf::new();
    let mut components = path.components();
    for component in components.by_ref() {
        let is_marker = matches!(component, Component::Normal(name) if name == HOLDINGS_DIR);
        if is_marker {
            let holdings_root = disk_root.join(HOLDINGS_DIR);
            let rest: Vec<String> = components
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            return Some((disk_root, holdings_root, rest.join("/")));
        }
        disk_root.push(component.as_os_str());
    }
    None
}

/// Looks up directory entries without trusting the filesystem's case rules.
pub trait PathCaseResolver: Send + Sync + Debug {
    /// The on-disk spelling of `name` inside `dir`, if such an entry exists.
    fn resolve_child(&self, dir: &Path, name: &str) -> Option<String>;

    fn is_case_insensitive(&self) -> bool;
}

fn scan_for(dir: &Path, name: &str) -> Option<String> {
    let entries = fs::read_dir(dir).ok()?;
    let mut fallback = None;
    for entry in entries.flatten() {
        let candidate = entry.file_name().to_string_lossy().into_owned();
        if candidate == name {
            return Some(candidate);
        }
        if fallback.is_none() && candidate.eq_ignore_ascii_case(name) {
            fallback = Some(candidate);
        }
    }
    fallback
}

/// For filesystems where `a` and `A` are different entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseSensitive;

impl PathCaseResolver for CaseSensitive {
    fn resolve_child(&self, dir: &Path, name: &str) -> Option<String> {
        if dir.join(name).symlink_metadata().is_ok() {
            return Some(name.to_string());
        }
        scan_for(dir, name)
    }

    fn is_case_insensitive(&self) -> bool {
        false
    }
}

/// For filesystems that fold case. A successful stat says nothing about the
/// stored spelling, so the listing is always consulted.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseInsensitive;

impl PathCaseResolver for CaseInsensitive {
    fn resolve_child(&self, dir: &Path, name: &str) -> Option<String> {
        scan_for(dir, name)
    }

    fn is_case_insensitive(&self) -> bool {
        true
    }
}

/// Picks a resolver by writing a mixed-case probe file into `dir`.
///
/// If `dir` is not writable the filesystem is assumed to be case-sensitive.
pub fn probe_case_resolver(dir: &Path) -> Box<dyn PathCaseResolver> {
    let probe = dir.join(format!(".PdsCaseProbe{}", std::process::id()));
    if fs::write(&probe, b"").is_err() {
        debug!("Case probe in {:?} not writable; assuming case-sensitive", dir);
        return Box::new(CaseSensitive);
    }

    let folded = dir.join(format!(".pdscaseprobe{}", std::process::id()));
    let insensitive = folded.exists();
    if let Err(e) = fs::remove_file(&probe) {
        warn!("Failed to remove case probe {:?}: {}", probe, e);
    }
    debug!("Case probe in {:?}: case-insensitive = {}", dir, insensitive);

    if insensitive {
        Box::new(CaseInsensitive)
    } else {
        Box::new(CaseSensitive)
    }
}
