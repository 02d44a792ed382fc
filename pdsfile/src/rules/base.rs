use crate::common::category::Voltype;
use crate::rules::{RuleBundle, RuleError, RuleSet};

/// Builds the rule bundle shared by every dataset.
///
/// Dataset bundles are prepended to this one, so everything here is a fallback.
pub fn base_bundle() -> Result<RuleBundle, RuleError> {
    let mut bundle = RuleBundle::named("base");
    bundle.descriptions = descriptions()?;
    bundle.split = split()?;
    bundle.volset_for_volname = volset_for_volname()?;
    for voltype in Voltype::ALL {
        let rules = associations(voltype)?;
        if !rules.is_empty() {
            bundle.associations.insert(voltype, rules);
        }
    }
    Ok(bundle)
}

/// Logical path -> description. Earlier rules are more specific.
fn descriptions() -> Result<RuleSet<String>, RuleError> {
    let regexes: [(&str, &str); 16] = [
        (r"checksums-[^/]+", "Checksum index directory"),
        (r"archives-[^/]+", "Archive directory"),
        (r"checksums-.*_md5\.txt", "MD5 checksum index"),
        (r"archives-.*\.tar\.gz", "Volume archive (tar.gz)"),
        (r"[^/]+", "Category directory"),
        (r"[^/]+/[^/]+", "Volume set"),
        (r"[^/]+/[^/]+/[^/]+", "Volume"),
        (r".*/AAREADME\.(TXT|HTM)", "Volume read-me file"),
        (r".*/ERRATA\.TXT", "Errata file"),
        (r".*/VOLDESC\.(CAT|SFD)", "Volume description"),
        (r".*\.LBL", "PDS label"),
        (r".*\.(TAB|CSV)", "Table"),
        (r".*\.(IMG|QUB|DAT)", "Data file"),
        (r".*\.(FMT|CAT)", "PDS format or catalog file"),
        (r".*\.(JPG|JPEG|PNG|GIF)", "Preview image"),
        (r".*\.(TXT|ASC|HTM|HTML|PDF)", "Document"),
    ];
    let mut rules = RuleSet::new();
    for (pattern, text) in regexes {
        rules.push_regex(pattern, true, text.to_string())?;
    }
    Ok(rules)
}

/// Basename -> (anchor, suffix, extension).
fn split() -> Result<RuleSet<(String, String, String)>, RuleError> {
    let triple = |a: &str, b: &str, c: &str| (a.to_string(), b.to_string(), c.to_string());
    RuleSet::new()
        .with_regex(r"(.*)(\.tar\.gz)", true, triple("${1}", "", "${2}"))?
        .with_regex(r"(.*)(_md5)(\.txt)", true, triple("${1}", "${2}", "${3}"))?
        .with_regex(r"(.*)(\.[^.]*)", false, triple("${1}", "", "${2}"))?
        .with_regex(r"(.*)", false, triple("${1}", "", ""))
}

/// `ABC_1001` -> `ABC_1xxx`; `GO_0017A` -> `GO_0xxx`.
fn volset_for_volname() -> Result<RuleSet<String>, RuleError> {
    RuleSet::new().with_regex(r"([A-Z][A-Z0-9]{1,5})_([0-9])[0-9]{3}[A-Z]?", true, "${1}_${2}xxx".to_string())
}

/// Logical path -> logical glob patterns in the `voltype` tree.
///
/// The first rule that matches a path is the primary association.
fn associations(voltype: Voltype) -> Result<RuleSet<Vec<String>>, RuleError> {
    let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let rules = RuleSet::new();
    let rules = match voltype {
        Voltype::Volumes => rules
            .with_regex(
                r"(?:calibrated|previews|diagrams)/([^/]+)/([^/]+)/(.*?)(?:_[a-z]+)?\.[^./]+",
                false,
                list(&["volumes/${1}/${2}/${3}.*"]),
            )?
            .with_regex(r"[a-z]+/([^/]+)/([^/]+)(?:/.*)?", false, list(&["volumes/${1}/${2}"]))?,
        Voltype::Calibrated => rules
            .with_regex(r"volumes/([^/]+)/([^/]+)/(.*)\.[^./]+", false, list(&["calibrated/${1}/${2}/${3}*.*"]))?
            .with_regex(r"[a-z]+/([^/]+)/([^/]+)(?:/.*)?", false, list(&["calibrated/${1}/${2}"]))?,
        Voltype::Previews => rules
            .with_regex(r"(?:volumes|calibrated)/([^/]+)/([^/]+)/(.*)\.[^./]+", false, list(&["previews/${1}/${2}/${3}_*.*"]))?
            .with_regex(r"[a-z]+/([^/]+)/([^/]+)(?:/.*)?", false, list(&["previews/${1}/${2}"]))?,
        Voltype::Diagrams => rules
            .with_regex(r"volumes/([^/]+)/([^/]+)/(.*)\.[^./]+", false, list(&["diagrams/${1}/${2}/${3}_*.*"]))?
            .with_regex(r"[a-z]+/([^/]+)/([^/]+)(?:/.*)?", false, list(&["diagrams/${1}/${2}"]))?,
        Voltype::Metadata => rules
            .with_regex(r"[a-z]+/([^/]+)/([^/]+)(?:/.*)?", false, list(&["metadata/${1}/${2}"]))?,
    };
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_bundle_builds() {
        let base = base_bundle().unwrap();
        assert_eq!(base.name, "base");
        assert!(base.neighbors.is_empty());
        assert_eq!(base.associations.len(), 5);
    }

    #[test]
    fn test_default_split() {
        let base = base_bundle().unwrap();
        let split = |name: &str| base.split.first(name).unwrap();
        assert_eq!(split("ABC_1001.tar.gz"), ("ABC_1001".into(), "".into(), ".tar.gz".into()));
        assert_eq!(split("ABC_1001_md5.txt"), ("ABC_1001".into(), "_md5".into(), ".txt".into()));
        assert_eq!(split("F1.IMG"), ("F1".into(), "".into(), ".IMG".into()));
        assert_eq!(split("a.b.c"), ("a.b".into(), "".into(), ".c".into()));
        assert_eq!(split("DATA"), ("DATA".into(), "".into(), "".into()));
    }

    #[test]
    fn test_default_volset_for_volname() {
        let base = base_bundle().unwrap();
        assert_eq!(base.volset_for_volname.first("ABC_1001").as_deref(), Some("ABC_1xxx"));
        assert_eq!(base.volset_for_volname.first("go_0017a").as_deref(), Some("go_0xxx"));
        assert!(base.volset_for_volname.first("DATA").is_none());
    }

    #[test]
    fn test_default_descriptions() {
        let base = base_bundle().unwrap();
        let describe = |logical: &str| base.descriptions.first(logical);
        assert_eq!(describe("volumes").as_deref(), Some("Category directory"));
        assert_eq!(describe("volumes/ABC_1xxx").as_deref(), Some("Volume set"));
        assert_eq!(describe("volumes/ABC_1xxx/ABC_1001").as_deref(), Some("Volume"));
        assert_eq!(describe("volumes/ABC_1xxx/ABC_1001/aareadme.txt").as_deref(), Some("Volume read-me file"));
        assert_eq!(describe("checksums-volumes/ABC_1xxx/ABC_1001_md5.txt").as_deref(), Some("MD5 checksum index"));
        assert_eq!(describe("volumes/A/B/DATA/F.IMG").as_deref(), Some("Data file"));
        assert!(describe("volumes/A/B/DATA/F.XYZ").is_none());
    }

    #[test]
    fn test_default_associations() {
        let base = base_bundle().unwrap();
        let previews = base.associations_for(Voltype::Previews);
        assert_eq!(
            previews.first("volumes/ABC_1xxx/ABC_1001/DATA/F1.IMG").unwrap(),
            vec!["previews/ABC_1xxx/ABC_1001/DATA/F1_*.*".to_string()]
        );
        assert_eq!(
            previews.all_flat("volumes/ABC_1xxx/ABC_1001/DATA/F1.IMG"),
            vec![
                "previews/ABC_1xxx/ABC_1001/DATA/F1_*.*".to_string(),
                "previews/ABC_1xxx/ABC_1001".to_string()
            ]
        );
        let volumes = base.associations_for(Voltype::Volumes);
        assert_eq!(
            volumes.first("previews/ABC_1xxx/ABC_1001/DATA/F1_thumb.jpg").unwrap(),
            vec!["volumes/ABC_1xxx/ABC_1001/DATA/F1.*".to_string()]
        );
    }
}
