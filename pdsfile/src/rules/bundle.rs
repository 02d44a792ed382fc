use std::collections::HashMap;
use std::sync::Arc;
use regex::{Regex, RegexBuilder};
use tracing::debug;
use crate::common::category::Voltype;
use crate::rules::{RuleError, RuleSet};

/// One rule set per rule category for a dataset.
///
/// A dataset bundle is composed with the shared base bundle by
/// [`RuleBundle::prepend_to`]; the dataset's entries come first in every set.
#[derive(Debug, Clone, Default)]
pub struct RuleBundle {
    pub name: String,
    /// Logical path -> description text.
    pub descriptions: RuleSet<String>,
    /// Logical path -> glob patterns (logical) of candidate neighbour directories.
    pub neighbors: RuleSet<Vec<String>>,
    /// Basename -> sort key.
    pub sort_key: RuleSet<String>,
    /// Basename -> (anchor, suffix, extension).
    pub split: RuleSet<(String, String, String)>,
    /// Target voltype -> (logical path -> associated logical path patterns).
    pub associations: HashMap<Voltype, RuleSet<Vec<String>>>,
    /// Volume name -> volume-set id.
    pub volset_for_volname: RuleSet<String>,
}

impl RuleBundle {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Returns this bundle's rules placed ahead of `base`'s rules.
    pub fn prepend_to(&self, base: &RuleBundle) -> RuleBundle {
        let mut associations = base.associations.clone();
        for (voltype, rules) in &self.associations {
            associations
                .entry(*voltype)
                .and_modify(|existing| existing.prepend(rules))
                .or_insert_with(|| rules.clone());
        }

        RuleBundle {
            name: self.name.clone(),
            descriptions: RuleSet::compose(&self.descriptions, &base.descriptions),
            neighbors: RuleSet::compose(&self.neighbors, &base.neighbors),
            sort_key: RuleSet::compose(&self.sort_key, &base.sort_key),
            split: RuleSet::compose(&self.split, &base.split),
            associations,
            volset_for_volname: RuleSet::compose(&self.volset_for_volname, &base.volset_for_volname),
        }
    }

    /// Association rules towards `voltype`; empty when none are declared.
    pub fn associations_for(&self, voltype: Voltype) -> RuleSet<Vec<String>> {
        self.associations.get(&voltype).cloned().unwrap_or_default()
    }
}

/// Maps dataset volume-set patterns to composed rule bundles.
///
/// Lookup is by registration order: the first pattern that matches a
/// volume-set id wins. Unmatched ids get the base bundle.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    base: Arc<RuleBundle>,
    datasets: Vec<Registered>,
}

#[derive(Debug, Clone)]
struct Registered {
    volsets: Regex,
    bundle: Arc<RuleBundle>,
    /// The dataset's own volume-name rules, before composition.
    volnames: RuleSet<String>,
}

impl RuleRegistry {
    pub fn new(base: RuleBundle) -> Self {
        Self {
            base: Arc::new(base),
            datasets: Vec::new(),
        }
    }

    /// Registers a dataset bundle, composing it with the base at this point.
    pub fn register(&mut self, volset_pattern: &str, bundle: RuleBundle) -> Result<(), RuleError> {
        let regex = RegexBuilder::new(&format!("^(?:{})$", volset_pattern))
            .case_insensitive(true)
            .build()
            .map_err(|source| RuleError::BadPattern {
                pattern: volset_pattern.to_string(),
                source,
            })?;
        debug!("Registered rule bundle '{}' for volume sets matching '{}'", bundle.name, volset_pattern);
        let composed = bundle.prepend_to(&self.base);
        self.datasets.push(Registered {
            volsets: regex,
            bundle: Arc::new(composed),
            volnames: bundle.volset_for_volname,
        });
        Ok(())
    }

    pub fn base(&self) -> &Arc<RuleBundle> {
        &self.base
    }

    /// The bundle that governs a volume-set id (without release suffix).
    pub fn for_volset(&self, volset_id: &str) -> &Arc<RuleBundle> {
        self.datasets
            .iter()
            .find(|entry| entry.volsets.is_match(volset_id))
            .map(|entry| &entry.bundle)
            .unwrap_or(&self.base)
    }

    /// The bundle registered under `name`, or the base bundle.
    pub fn bundle(&self, name: &str) -> &Arc<RuleBundle> {
        self.datasets
            .iter()
            .find(|entry| entry.bundle.name == name)
            .map(|entry| &entry.bundle)
            .unwrap_or(&self.base)
    }

    /// Resolves the volume-set id a bare volume name belongs to.
    ///
    /// Dataset rules are tried in registration order before the base rule.
    pub fn volset_for_volname(&self, volname: &str) -> Option<String> {
        self.datasets
            .iter()
            .find_map(|entry| entry.volnames.first(volname))
            .or_else(|| self.base.volset_for_volname.first(volname))
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RuleBundle {
        let mut base = RuleBundle::named("base");
        base.descriptions.push_regex(".*", false, "generic".to_string()).unwrap();
        base.sort_key.push_regex("(.*)", false, "${1}".to_string()).unwrap();
        base
    }

    fn dataset(name: &str, description: &str) -> RuleBundle {
        let mut bundle = RuleBundle::named(name);
        bundle.descriptions.push_regex(r".*\.IMG", true, description.to_string()).unwrap();
        bundle
    }

    #[test]
    fn test_registry_composes_and_dispatches() {
        let mut registry = RuleRegistry::new(base());
        registry.register("ABC_[0-9]xxx", dataset("ABC", "ABC image")).unwrap();
        registry.register("ABC_.*", dataset("ABC2", "shadowed")).unwrap();

        let abc = registry.for_volset("ABC_1xxx");
        assert_eq!(abc.name, "ABC");
        assert_eq!(abc.descriptions.first("X.img").as_deref(), Some("ABC image"));
        assert_eq!(abc.descriptions.first("X.txt").as_deref(), Some("generic"));
        assert_eq!(abc.sort_key.first("name").as_deref(), Some("name"));

        // 第一个匹配的注册项优先
        assert_eq!(registry.for_volset("abc_2xxx").name, "ABC");
        assert_eq!(registry.for_volset("ABC_extra").name, "ABC2");
        assert_eq!(registry.for_volset("XYZ_1xxx").name, "base");
        assert_eq!(registry.bundle("ABC2").name, "ABC2");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_volname_rules_checked_before_base() {
        let mut base = base();
        base.volset_for_volname
            .push_regex(r"([A-Z]+)_([0-9])[0-9]{3}", false, "${1}_${2}xxx".to_string())
            .unwrap();
        let mut registry = RuleRegistry::new(base);
        registry.register("ABC_[0-9]xxx", dataset("ABC", "ABC image")).unwrap();
        let mut nh = RuleBundle::named("NH");
        nh.volset_for_volname
            .push_regex(r"NH([A-Z]{2})([A-Z]{2})_([0-9])[0-9]{3}", false, "NHxx${2}_${3}xxx".to_string())
            .unwrap();
        registry.register("NHxx[A-Z]{2}_[0-9]xxx", nh).unwrap();

        assert_eq!(registry.volset_for_volname("NHLALO_1001").as_deref(), Some("NHxxLO_1xxx"));
        assert_eq!(registry.volset_for_volname("ABC_1001").as_deref(), Some("ABC_1xxx"));
        assert_eq!(registry.volset_for_volname("nothing"), None);
    }

    #[test]
    fn test_prepend_merges_associations() {
        let mut base = base();
        let mut base_previews = RuleSet::new();
        base_previews.push_regex("(.*)", false, vec!["base:${1}".to_string()]).unwrap();
        base.associations.insert(Voltype::Previews, base_previews);

        let mut data = RuleBundle::named("D");
        let mut previews = RuleSet::new();
        previews.push_regex("(.*)", false, vec!["data:${1}".to_string()]).unwrap();
        data.associations.insert(Voltype::Previews, previews);

        let composed = data.prepend_to(&base);
        assert_eq!(
            composed.associations_for(Voltype::Previews).all_flat("x"),
            vec!["data:x".to_string(), "base:x".to_string()]
        );
        assert!(composed.associations_for(Voltype::Diagrams).is_empty());
    }
}
