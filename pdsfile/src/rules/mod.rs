pub mod base;
pub mod bundle;
pub mod config;

pub use bundle::{RuleBundle, RuleRegistry};
pub use config::{DatasetRules, RuleEntry, RuleResult};

use regex::{Captures, Regex, RegexBuilder};
use std::collections::HashMap;

/// Defines errors that can occur while building rule sets.
//
// // 定义在构建规则集时可能发生的错误。
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A rule pattern failed to compile.
    //
    // // 规则中的正则表达式编译失败。
    #[error("Invalid rule pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rule result does not have the shape the rule category expects.
    //
    // // 规则结果的形状与该规则类别不符。
    #[error("Rule result for '{pattern}' must be {expected}")]
    BadResult { pattern: String, expected: &'static str },

    /// A glob pattern failed to compile.
    //
    // // glob 模式编译失败。
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),
}

/// A rule result that can absorb regex capture groups.
///
/// Templates use the `regex` crate syntax: `$1`, `${1}`, `${name}`.
pub trait Expand: Clone {
    fn expand(&self, caps: &Captures<'_>) -> Self;
}

fn expand_str(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::new();
    caps.expand(template, &mut out);
    out
}

impl Expand for String {
    fn expand(&self, caps: &Captures<'_>) -> Self {
        expand_str(self, caps)
    }
}

impl Expand for Vec<String> {
    fn expand(&self, caps: &Captures<'_>) -> Self {
        self.iter().map(|t| expand_str(t, caps)).collect()
    }
}

impl Expand for (String, String, String) {
    fn expand(&self, caps: &Captures<'_>) -> Self {
        (expand_str(&self.0, caps), expand_str(&self.1, caps), expand_str(&self.2, caps))
    }
}

impl Expand for bool {
    fn expand(&self, _caps: &Captures<'_>) -> Self {
        *self
    }
}

#[derive(Debug, Clone)]
enum Entry<T> {
    /// 正则规则：整串匹配，结果模板中可引用捕获组
    Regex { regex: Regex, result: T },
    /// 字面量表：精确键查找
    Table { map: HashMap<String, T>, ignore_case: bool },
}

/// An ordered pattern cascade mapping an input string to results.
///
/// Entries are consulted in order. [`RuleSet::first`] returns the earliest
/// match and [`RuleSet::all`] returns every match in entry order. Position is
/// priority: rules pushed or prepended earlier win.
#[derive(Debug, Clone)]
pub struct RuleSet<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: Expand> RuleSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RuleSet::push_regex`].
    pub fn with_regex(mut self, pattern: &str, ignore_case: bool, result: T) -> Result<Self, RuleError> {
        self.push_regex(pattern, ignore_case, result)?;
        Ok(self)
    }

    /// Appends a regex rule. The pattern must match the entire input.
    pub fn push_regex(&mut self, pattern: &str, ignore_case: bool, result: T) -> Result<(), RuleError> {
        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(ignore_case)
            .build()
            .map_err(|source| RuleError::BadPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        self.entries.push(Entry::Regex { regex, result });
        Ok(())
    }

    /// Appends a literal-key table as a single entry.
    pub fn push_table<I>(&mut self, table: I, ignore_case: bool)
    where
        I: IntoIterator<Item = (String, T)>,
    {
        let map = table
            .into_iter()
            .map(|(k, v)| (if ignore_case { k.to_lowercase() } else { k }, v))
            .collect();
        self.entries.push(Entry::Table { map, ignore_case });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn apply(entry: &Entry<T>, key: &str) -> Option<T> {
        match entry {
            Entry::Regex { regex, result } => regex.captures(key).map(|caps| result.expand(&caps)),
            Entry::Table { map, ignore_case } => {
                if *ignore_case {
                    map.get(&key.to_lowercase()).cloned()
                } else {
                    map.get(key).cloned()
                }
            }
        }
    }

    /// The result of the earliest matching entry, if any.
    pub fn first(&self, key: &str) -> Option<T> {
        self.entries.iter().find_map(|entry| Self::apply(entry, key))
    }

    /// Every matching entry's result, in entry order.
    pub fn all(&self, key: &str) -> Vec<T> {
        self.entries
            .iter()
            .filter_map(|entry| Self::apply(entry, key))
            .collect()
    }

    /// Concatenates two rule sets; `priority` entries come first.
    pub fn compose(priority: &RuleSet<T>, base: &RuleSet<T>) -> RuleSet<T> {
        let mut entries = priority.entries.clone();
        entries.extend(base.entries.iter().cloned());
        RuleSet { entries }
    }

    /// Puts `other`'s entries ahead of this set's entries.
    pub fn prepend(&mut self, other: &RuleSet<T>) {
        let mut entries = other.entries.clone();
        entries.append(&mut self.entries);
        self.entries = entries;
    }
}

impl RuleSet<Vec<String>> {
    /// All results flattened into one list, duplicates removed, order kept.
    pub fn all_flat(&self, key: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for item in self.all(key).into_iter().flatten() {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RuleSet<String> {
        RuleSet::new()
            .with_regex(r"(.*)\.LBL", true, "label for ${1}".to_string())
            .unwrap()
            .with_regex(r".*", false, "anything".to_string())
            .unwrap()
    }

    fn derived() -> RuleSet<String> {
        RuleSet::new()
            .with_regex(r"(N[0-9]+)_.*\.LBL", false, "camera label ${1}".to_string())
            .unwrap()
    }

    #[test]
    fn test_first_and_all() {
        let rules = base();
        assert_eq!(rules.first("IMG.lbl").as_deref(), Some("label for IMG"));
        assert_eq!(rules.all("IMG.LBL"), vec!["label for IMG".to_string(), "anything".to_string()]);
        assert_eq!(rules.first("x"), Some("anything".to_string()));
    }

    #[test]
    fn test_full_match_required() {
        let rules: RuleSet<String> = RuleSet::new().with_regex("ABC", false, "hit".to_string()).unwrap();
        assert!(rules.first("ABCD").is_none());
        assert!(rules.first("xABC").is_none());
        assert!(rules.first("abc").is_none());
        assert_eq!(rules.first("ABC").as_deref(), Some("hit"));
    }

    #[test]
    fn test_compose_priority() {
        let composed = RuleSet::compose(&derived(), &base());
        for key in ["N1234_X.LBL", "OTHER.LBL", "plain.txt"] {
            let expected = derived().first(key).or_else(|| base().first(key));
            assert_eq!(composed.first(key), expected, "key {key}");
        }
        assert_eq!(composed.first("N1234_X.LBL").as_deref(), Some("camera label N1234"));

        let mut prepended = base();
        prepended.prepend(&derived());
        assert_eq!(prepended.first("N1234_X.LBL").as_deref(), Some("camera label N1234"));
        assert_eq!(prepended.len(), 3);
    }

    #[test]
    fn test_one_to_many_expansion() {
        let rules: RuleSet<Vec<String>> = RuleSet::new()
            .with_regex(
                r"volumes/(\w+)/(\w+)/DATA/(\w+)\.IMG",
                false,
                vec!["previews/${1}/${2}/DATA/${3}_thumb.jpg".to_string(), "previews/${1}/${2}/DATA/${3}_full.png".to_string()],
            )
            .unwrap()
            .with_regex(r"volumes/(\w+)/.*", false, vec!["previews/${1}/${1}_previews_md5.txt".to_string(), "previews/${1}/DATA/${1}_thumb.jpg".to_string()])
            .unwrap();
        let flat = rules.all_flat("volumes/VS/V1/DATA/F1.IMG");
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[0], "previews/VS/V1/DATA/F1_thumb.jpg");
        assert_eq!(flat[2], "previews/VS/VS_previews_md5.txt");
    }

    #[test]
    fn test_literal_table() {
        let mut rules: RuleSet<String> = RuleSet::new();
        rules.push_table([("AAREADME.TXT".to_string(), "Read me".to_string())], true);
        rules.push_regex(r".*\.TXT", true, "Text".to_string()).unwrap();
        assert_eq!(rules.first("aareadme.txt").as_deref(), Some("Read me"));
        assert_eq!(rules.all("AAREADME.TXT").len(), 2);
        assert!(rules.first("nope").is_none());
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let rules: RuleSet<Vec<String>> = RuleSet::new();
        assert!(rules.first("anything").is_none());
        assert!(rules.all_flat("anything").is_empty());
    }

    #[test]
    fn test_bad_pattern() {
        let err = RuleSet::<String>::new().with_regex("(unclosed", false, String::new()).unwrap_err();
        assert!(matches!(err, RuleError::BadPattern { .. }));
    }
}
