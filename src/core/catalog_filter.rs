// src/core/catalog_filter.rs

//! # Catalog Filter
//!
//! Derives a restricted catalog from a base catalog. Filtering is a pure
//! projection: the base is only borrowed, relative order is preserved, and
//! applying the same policy twice gives the same result.

use crate::{
    core::{
        cache::{self, Freshness},
        catalog_io::CatalogIoError,
    },
    models::{Catalog, CatalogFile, CommandSpec, command_key},
};
use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::path::Path;

/// `generatedFor` value of the controller-tuning catalog.
pub const CONTROLLER_TUNING: &str = "controller_tuning";

lazy_static! {
    static ref CONTROLLER_KEYWORDS: Vec<Regex> = vec![
        Regex::new(r"(?i)cntrl").unwrap(),
        Regex::new(r"(?i)at\s*target").unwrap(),
        Regex::new(r"(?i)scale\s*num").unwrap(),
        Regex::new(r"(?i)scale\s*denom").unwrap(),
    ];
}

/// A `*`/`?` wildcard over command names, case-insensitive. A pattern
/// without the `Cfg.` prefix also matches the prefixed command.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    /// Compiles a `*`/`?` wildcard into a case-insensitive matcher.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::from("^");
        for c in pattern.trim().chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');
        let regex = RegexBuilder::new(&expr).case_insensitive(true).build()?;
        Ok(Self {
            source: pattern.trim().to_string(),
            regex,
        })
    }

    /// Matches the full name or the name without its `Cfg.` prefix.
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name) || self.regex.is_match(&command_key(name))
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Admission rule for a derived catalog.
#[derive(Debug, Clone)]
pub enum FilterPolicy {
    /// Only commands matching at least one pattern.
    AllowList(Vec<NamePattern>),
    /// Everything except commands matching any pattern.
    DenyList(Vec<NamePattern>),
    /// Commands whose name, template, description or category matches any regex.
    Matching { labels: Vec<String>, patterns: Vec<Regex> },
    /// Conjunction of policies. Empty admits everything.
    All(Vec<FilterPolicy>),
}

impl FilterPolicy {
    /// An [`FilterPolicy::AllowList`] from wildcards.
    pub fn allow_list<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        Ok(Self::AllowList(compile(patterns)?))
    }

    /// A [`FilterPolicy::DenyList`] from wildcards.
    pub fn deny_list<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        Ok(Self::DenyList(compile(patterns)?))
    }

    /// Commands relevant to controller tuning: loop gains, at-target
    /// monitoring and drive/encoder scaling.
    pub fn controller_only() -> Self {
        Self::Matching {
            labels: ["*cntrl*", "*atTarget*", "*scaleNum*", "*scaleDenom*"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            patterns: CONTROLLER_KEYWORDS.clone(),
        }
    }

    /// True if `spec` belongs in the derived catalog.
    pub fn admits(&self, spec: &CommandSpec) -> bool {
        match self {
            Self::AllowList(patterns) => patterns.iter().any(|p| p.matches(&spec.name)),
            Self::DenyList(patterns) => !patterns.iter().any(|p| p.matches(&spec.name)),
            Self::Matching { patterns, .. } => {
                let haystack = [
                    spec.name.as_str(),
                    spec.template.as_str(),
                    spec.description.as_str(),
                    spec.category.as_str(),
                ]
                .join(" | ");
                patterns.iter().any(|r| r.is_match(&haystack))
            }
            Self::All(policies) => policies.iter().all(|p| p.admits(spec)),
        }
    }

    /// Short description recorded in the derived file's `filter` field.
    pub fn describe(&self) -> Vec<String> {
        match self {
            Self::AllowList(patterns) => patterns.iter().map(|p| p.as_str().to_string()).collect(),
            Self::DenyList(patterns) => patterns.iter().map(|p| format!("!{}", p.as_str())).collect(),
            Self::Matching { labels, .. } => labels.clone(),
            Self::All(policies) => policies.iter().flat_map(|p| p.describe()).collect(),
        }
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<NamePattern>, regex::Error> {
    patterns
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.trim().is_empty())
        .map(NamePattern::new)
        .collect()
}

/// Returns the sub-catalog admitted by `policy`, in base order.
pub fn apply(base: &Catalog, policy: &FilterPolicy) -> Catalog {
    let admitted: Vec<CommandSpec> = base.iter().filter(|c| policy.admits(c)).cloned().collect();
    debug!("Filter admitted {} of {} command(s)", admitted.len(), base.len());
    Catalog::from_commands(admitted)
}

/// Builds a derived catalog file. `source_hash` is the content hash of the
/// base file, recorded so that staleness can be checked later.
pub fn derive(
    base: &CatalogFile,
    policy: &FilterPolicy,
    generated_for: Option<&str>,
    source_hash: Option<String>,
) -> CatalogFile {
    let mut derived = CatalogFile::new(apply(&base.commands, policy));
    derived.generated_from = base.generated_from.clone();
    derived.generated_for = generated_for.map(str::to_string);
    derived.filter = policy.describe();
    derived.source_hash = source_hash;
    derived
}

/// True when `derived` was not produced from the current content of the
/// base file at `base_path`. A derived file without a recorded hash counts
/// as stale.
pub fn is_stale(base_path: &Path, derived: &CatalogFile) -> Result<bool, CatalogIoError> {
    let freshness = cache::check_freshness(base_path, derived.source_hash.as_deref())?;
    Ok(freshness != Freshness::Fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog_io;
    use tempfile::tempdir;

    fn base() -> Catalog {
        let mut tuned = CommandSpec::new("Cfg.SetAxisCntrlKp", vec![]);
        tuned.description = "Set proportional gain".into();
        let mut scale = CommandSpec::new("Cfg.SetAxisEncScaleDenom", vec![]);
        scale.category = "Motion".into();
        let mut target = CommandSpec::new("GetAxisAtTargetTol", vec![]);
        target.description = "at target tolerance".into();
        Catalog::from_commands(vec![
            tuned,
            CommandSpec::new("Cfg.EcApplyConfig", vec![]),
            scale,
            target,
            CommandSpec::new("GetControllerError", vec![]),
        ])
    }

    fn names(catalog: &Catalog) -> Vec<&str> {
        catalog.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_controller_only_keeps_order() {
        let catalog = base();
        let derived = apply(&catalog, &FilterPolicy::controller_only());
        assert_eq!(
            names(&derived),
            vec!["Cfg.SetAxisCntrlKp", "Cfg.SetAxisEncScaleDenom", "GetAxisAtTargetTol"]
        );
    }

    #[test]
    fn test_filter_is_pure_and_repeatable() {
        let catalog = base();
        let before = catalog.clone();
        let policy = FilterPolicy::deny_list(&["ecapply*"]).unwrap();
        let first = apply(&catalog, &policy);
        let second = apply(&catalog, &policy);
        assert_eq!(first, second);
        assert_eq!(catalog, before);
        assert!(first.get("Cfg.EcApplyConfig").is_none());
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_allow_list_and_conjunction() {
        let catalog = base();
        let policy = FilterPolicy::All(vec![
            FilterPolicy::allow_list(&["Cfg.*"]).unwrap(),
            FilterPolicy::controller_only(),
        ]);
        assert_eq!(
            names(&apply(&catalog, &policy)),
            vec!["Cfg.SetAxisCntrlKp", "Cfg.SetAxisEncScaleDenom"]
        );
        assert_eq!(apply(&catalog, &FilterPolicy::All(vec![])).len(), catalog.len());
    }

    #[test]
    fn test_wildcard_pattern() {
        let pattern = NamePattern::new("Get?xis*").unwrap();
        assert!(pattern.matches("GetAxisAtTargetTol"));
        assert!(!pattern.matches("GetControllerError"));
        assert!(NamePattern::new("a.b").unwrap().matches("A.B"));
        assert!(!NamePattern::new("a.b").unwrap().matches("axb"));
    }

    #[test]
    fn test_derived_file_tracks_base_hash() {
        let dir = tempdir().unwrap();
        let base_path = dir.path().join("ecmc_commands.json");
        let base_file = CatalogFile::new(base());
        catalog_io::save_catalog(&base_path, &base_file).unwrap();

        let hash = cache::file_hash(&base_path).unwrap();
        let derived = derive(
            &base_file,
            &FilterPolicy::controller_only(),
            Some(CONTROLLER_TUNING),
            Some(hash),
        );
        assert_eq!(derived.command_count, 3);
        assert_eq!(derived.filter.len(), 4);
        assert!(!is_stale(&base_path, &derived).unwrap());

        let mut changed = base_file.clone();
        changed.commands = Catalog::from_commands(vec![CommandSpec::new("Other", vec![])]);
        catalog_io::save_catalog(&base_path, &changed).unwrap();
        assert!(is_stale(&base_path, &derived).unwrap());
    }
}
