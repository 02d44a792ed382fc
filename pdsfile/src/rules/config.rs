use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::common::category::Voltype;
use crate::rules::{RuleBundle, RuleError, RuleSet};

/// The result template of a configured rule: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleResult {
    One(String),
    Many(Vec<String>),
}

/// One configured rule entry: either a regex rule or a literal-key table.
///
/// ```json
/// { "pattern": "(.*)\\.LBL", "ignoreCase": true, "result": "PDS label for ${1}" }
/// { "table": { "AAREADME.TXT": "Volume read-me" }, "ignoreCase": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Regex {
        pattern: String,
        #[serde(default, rename = "ignoreCase")]
        ignore_case: bool,
        result: RuleResult,
    },
    Table {
        table: BTreeMap<String, RuleResult>,
        #[serde(default, rename = "ignoreCase")]
        ignore_case: bool,
    },
}

/// The rule tables of one dataset, as stored in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRules {
    /// Dataset name, e.g. "COISS".
    pub name: String,
    /// Volume-set ids this dataset owns, e.g. "COISS_[0-9]xxx".
    pub volset_pattern: String,
    #[serde(default)]
    pub descriptions: Vec<RuleEntry>,
    /// Logical path -> glob patterns of neighbouring directories.
    #[serde(default)]
    pub neighbors: Vec<RuleEntry>,
    /// Basename -> sort key.
    #[serde(default)]
    pub sort_key: Vec<RuleEntry>,
    /// Basename -> [anchor, suffix, extension].
    #[serde(default)]
    pub split: Vec<RuleEntry>,
    /// Target voltype -> (logical path -> associated logical path patterns).
    #[serde(default)]
    pub associations: BTreeMap<Voltype, Vec<RuleEntry>>,
    /// Volume name -> volume-set id.
    #[serde(default)]
    pub volset_for_volname: Vec<RuleEntry>,
}

impl DatasetRules {
    /// Compiles the tables into a bundle (not yet composed with the base).
    pub fn compile(&self) -> Result<RuleBundle, RuleError> {
        let mut bundle = RuleBundle::named(&self.name);
        bundle.descriptions = string_rules(&self.descriptions)?;
        bundle.neighbors = list_rules(&self.neighbors)?;
        bundle.sort_key = string_rules(&self.sort_key)?;
        bundle.split = split_rules(&self.split)?;
        bundle.volset_for_volname = string_rules(&self.volset_for_volname)?;
        for (voltype, entries) in &self.associations {
            bundle.associations.insert(*voltype, list_rules(entries)?);
        }
        Ok(bundle)
    }
}

fn pattern_of(entry: &RuleEntry) -> String {
    match entry {
        RuleEntry::Regex { pattern, .. } => pattern.clone(),
        RuleEntry::Table { .. } => "<table>".to_string(),
    }
}

/// Rules whose results must be single strings.
pub(crate) fn string_rules(entries: &[RuleEntry]) -> Result<RuleSet<String>, RuleError> {
    let one = |entry: &RuleEntry, result: &RuleResult| match result {
        RuleResult::One(s) => Ok(s.clone()),
        RuleResult::Many(_) => Err(RuleError::BadResult {
            pattern: pattern_of(entry),
            expected: "a single string",
        }),
    };

    let mut rules = RuleSet::new();
    for entry in entries {
        match entry {
            RuleEntry::Regex { pattern, ignore_case, result } => {
                rules.push_regex(pattern, *ignore_case, one(entry, result)?)?;
            }
            RuleEntry::Table { table, ignore_case } => {
                let mut converted = Vec::with_capacity(table.len());
                for (key, result) in table {
                    converted.push((key.clone(), one(entry, result)?));
                }
                rules.push_table(converted, *ignore_case);
            }
        }
    }
    Ok(rules)
}

fn to_list(result: &RuleResult) -> Vec<String> {
    match result {
        RuleResult::One(s) => vec![s.clone()],
        RuleResult::Many(v) => v.clone(),
    }
}

/// Rules whose results are lists; a single string becomes a one-item list.
pub(crate) fn list_rules(entries: &[RuleEntry]) -> Result<RuleSet<Vec<String>>, RuleError> {
    let mut rules = RuleSet::new();
    for entry in entries {
        match entry {
            RuleEntry::Regex { pattern, ignore_case, result } => {
                rules.push_regex(pattern, *ignore_case, to_list(result))?;
            }
            RuleEntry::Table { table, ignore_case } => {
                rules.push_table(table.iter().map(|(k, r)| (k.clone(), to_list(r))), *ignore_case);
            }
        }
    }
    Ok(rules)
}

/// Rules whose results are `[anchor, suffix, extension]` triples.
pub(crate) fn split_rules(entries: &[RuleEntry]) -> Result<RuleSet<(String, String, String)>, RuleError> {
    let triple = |entry: &RuleEntry, result: &RuleResult| match result {
        RuleResult::Many(v) if v.len() == 3 => Ok((v[0].clone(), v[1].clone(), v[2].clone())),
        _ => Err(RuleError::BadResult {
            pattern: pattern_of(entry),
            expected: "a list of three strings",
        }),
    };

    let mut rules = RuleSet::new();
    for entry in entries {
        match entry {
            RuleEntry::Regex { pattern, ignore_case, result } => {
                rules.push_regex(pattern, *ignore_case, triple(entry, result)?)?;
            }
            RuleEntry::Table { table, ignore_case } => {
                let mut converted = Vec::with_capacity(table.len());
                for (key, result) in table {
                    converted.push((key.clone(), triple(entry, result)?));
                }
                rules.push_table(converted, *ignore_case);
            }
        }
    }
    Ok(rules)
}
