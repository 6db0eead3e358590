// src/core/catalog_builder.rs

//! # Catalog Builder
//!
//! Merges the scanner's per-occurrence output with the documentation index
//! into a [`Catalog`]: one entry per command name, sorted by name.
//!
//! Reconciliation rules:
//! - occurrences that disagree on parameter count keep the widest signature and
//!   record a [`BuildWarning::SignatureConflict`];
//! - parameters beyond the narrowest observed signature become optional;
//! - documented parameter names replace the positional type-hint names.
//!
//! The output depends only on the inputs, so identical inputs serialize to
//! identical bytes.

use crate::{
    core::{
        doc_matcher::{self, DocEntry, DocIndex},
        scanner::{self, ScanOptions, ScannedCommand},
        sources::SourceFile,
    },
    models::{
        BuildWarning, Catalog, CatalogFile, CommandForm, CommandSpec, GeneratedFrom, RuntimeClass,
        command_key,
    },
};
use log::{debug, info};
use std::collections::BTreeMap;

/// Result of one builder run. Warnings never abort the build.
#[derive(Debug, Default)]
pub struct CatalogBuild {
    /// The merged catalog, sorted by name.
    pub catalog: Catalog,
    /// Everything skipped or reconciled on the way.
    pub warnings: Vec<BuildWarning>,
    /// Display path of the parser source.
    pub parser: String,
    /// Number of headers read for documentation.
    pub headers_scanned: usize,
}

impl CatalogBuild {
    /// Wraps the catalog in its on-disk envelope.
    pub fn into_file(self, headers_root: &str) -> CatalogFile {
        let mut file = CatalogFile::new(self.catalog);
        file.generated_from = Some(GeneratedFrom {
            parser: self.parser,
            headers_root: headers_root.to_string(),
            header_count_scanned: self.headers_scanned,
        });
        file
    }
}

/// Scans `parser`, matches documentation from `headers`, and merges the two.
pub fn build_catalog(parser: &SourceFile, headers: &[SourceFile], options: &ScanOptions) -> CatalogBuild {
    let scan = scanner::scan_source(&parser.text, &parser.path, options);
    let docs = doc_matcher::match_docs(headers);
    info!(
        "Scanned {} command occurrence(s) in '{}' and {} documented key(s) in {} header(s)",
        scan.commands.len(),
        parser.path,
        docs.len(),
        docs.headers_scanned
    );

    let mut warnings = scan.warnings;
    warnings.extend(docs.warnings.iter().cloned());

    let (catalog, merge_warnings) = merge(scan.commands, &docs, &parser.path);
    warnings.extend(merge_warnings);

    CatalogBuild {
        catalog,
        warnings,
        parser: parser.path.clone(),
        headers_scanned: docs.headers_scanned,
    }
}

/// Pure merge stage: groups occurrences by canonical name and reconciles them.
pub fn merge(
    scanned: Vec<ScannedCommand>,
    docs: &DocIndex,
    origin: &str,
) -> (Catalog, Vec<BuildWarning>) {
    let mut groups: BTreeMap<String, Vec<ScannedCommand>> = BTreeMap::new();
    for occurrence in scanned {
        let name = canonical_name(&occurrence, docs);
        groups.entry(name).or_default().push(occurrence);
    }

    let mut warnings = Vec::new();
    let mut commands = Vec::with_capacity(groups.len());

    for (name, occurrences) in groups {
        let Some(kept) = widest(&occurrences) else {
            continue;
        };
        let kept_count = kept.parameters.len();
        let min_count = occurrences
            .iter()
            .map(|o| o.parameters.len())
            .min()
            .unwrap_or(kept_count);

        for other in occurrences.iter().filter(|o| o.parameters.len() != kept_count) {
            debug!(
                "Signature conflict for '{}': {} vs {} parameter(s)",
                name,
                kept_count,
                other.parameters.len()
            );
            warnings.push(BuildWarning::SignatureConflict {
                name: name.clone(),
                kept: kept_count,
                discarded: other.parameters.len(),
                location: format!("{}:{}", origin, other.line),
            });
        }

        let mut parameters = kept.parameters.clone();
        for param in parameters.iter_mut().filter(|p| p.order >= min_count) {
            param.optional = true;
        }

        let doc = docs.lookup(&name);
        if let Some(doc) = doc {
            apply_param_docs(&mut parameters, doc);
        }

        let mut spec = CommandSpec {
            form: kept.form,
            parameters,
            description: doc.map(|d| d.summary.clone()).unwrap_or_default(),
            source_ref: format!("{}:{}", origin, kept.line),
            template: String::new(),
            category: category_for(&name, kept.form).to_string(),
            runtime_class: runtime_class_for(&name, kept.form),
            header_source: doc.map(|d| d.header.clone()).unwrap_or_default(),
            header_example: doc.map(|d| d.example.clone()).unwrap_or_default(),
            name,
        };
        spec.template = spec.render_template();
        commands.push(spec);
    }

    (Catalog::from_commands(commands), warnings)
}

/// The name a command is catalogued under. Commands handled by the
/// configuration handler (or documented with a `Cfg.` example) get the
/// `Cfg.` prefix external callers must use.
fn canonical_name(occurrence: &ScannedCommand, docs: &DocIndex) -> String {
    let name = &occurrence.name;
    if occurrence.form != CommandForm::Call || name.starts_with("Cfg.") || name.starts_with("Main.") {
        return name.clone();
    }
    let documented_as_cfg = docs
        .lookup(name)
        .is_some_and(|doc| doc.example.starts_with("Cfg."));
    if occurrence.in_config_scope || documented_as_cfg {
        format!("Cfg.{}", name)
    } else {
        name.clone()
    }
}

/// First occurrence with the greatest parameter count.
fn widest(occurrences: &[ScannedCommand]) -> Option<&ScannedCommand> {
    occurrences.iter().fold(None, |best: Option<&ScannedCommand>, o| match best {
        Some(b) if b.parameters.len() >= o.parameters.len() => Some(b),
        _ => Some(o),
    })
}

/// Renames positional placeholders after documented parameters and copies
/// their descriptions. Explicitly named slots keep their names.
fn apply_param_docs(parameters: &mut [crate::models::CommandParameter], doc: &DocEntry) {
    for (param, param_doc) in parameters.iter_mut().zip(&doc.params) {
        let generic = param.hint.as_deref() == Some(param.name.as_str())
            || param.name == format!("arg{}", param.order + 1);
        if generic {
            param.name = param_doc.name.clone();
        }
        if param.description.is_empty() {
            param.description = param_doc.description.clone();
        }
    }
}

/// Coarse grouping used by the front end's command list.
pub fn category_for(name: &str, form: CommandForm) -> &'static str {
    let key = command_key(name);
    if key.starts_with("ec") || key.contains("ecentry") || key.contains("sdo") || key.contains("soe") {
        "EtherCAT"
    } else if key.contains("plc") {
        "PLC"
    } else if key.contains("storage") || key.contains("lut") {
        "Storage/Misc"
    } else if key.contains("plugin") {
        "Plugin"
    } else if ["setaxis", "getaxis", "move", "stop"].iter().any(|p| key.starts_with(p))
        || form == CommandForm::Query
        || name.starts_with("Main.M")
    {
        "Motion"
    } else if name.starts_with("Cfg.") {
        "Configuration"
    } else {
        "General"
    }
}

/// Conservative runtime classification based on how the parser routes a command.
pub fn runtime_class_for(name: &str, form: CommandForm) -> RuntimeClass {
    if name.starts_with("Cfg.") {
        return RuntimeClass::ConfigOnly;
    }
    if name.starts_with("Main.M") || name == "ADSPORT" || form == CommandForm::Query {
        return RuntimeClass::Runtime;
    }
    let runtime_prefixes = ["Move", "Stop", "Get", "Read", "Write", "AppendDataStorage"];
    if runtime_prefixes.iter().any(|p| name.starts_with(p)) {
        return RuntimeClass::Runtime;
    }
    RuntimeClass::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog_io;

    fn file(path: &str, text: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            text: text.to_string(),
        }
    }

    const PARSER: &str = r#"
static int handleCfgCommand(const char *myarg_1) {
  nvals = sscanf(myarg_1, "SetAxisEnable(%d,%d)", &iValue, &iValue2);
  nvals = sscanf(myarg_1, "Foo(%d)", &iValue);
  nvals = sscanf(myarg_1, "Foo(%d,%d,%d)", &iValue, &iValue2, &iValue3);
  nvals = sscanf(myarg_1, "Foo(%d)", &iValue);
  return 0;
}
int motorHandleOneArg(const char *myarg_1) {
  if (!strcmp(myarg_1, "GetControllerError()")) {}
  if (!strcmp(myarg_1, "GetControllerError()")) {}
  nvals = sscanf(myarg_1, "MoveAbsolutePosition(%d,%lf,%lf,%lf,%lf)", &a, &b, &c, &d, &e);
  nvals = sscanf(myarg_1, "Main.M%d.bEnable=%d", &iValue, &iValue2);
  return 0;
}
"#;

    const HEADER: &str = r#"
/** SetAxisEnable: enables or disables the given axis
 * \param axisId Axis index.
 * \param enable 1 enables, 0 disables.
 */
int setAxisEnable(int axisId, int enable);
"#;

    fn build() -> CatalogBuild {
        build_catalog(
            &file("devEcmcSup/com/ecmcCmdParser.c", PARSER),
            &[file("devEcmcSup/motion/ecmcMotion.h", HEADER)],
            &ScanOptions::default(),
        )
    }

    #[test]
    fn test_names_unique_and_sorted() {
        let result = build();
        let names: Vec<&str> = result.catalog.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Cfg.Foo",
                "Cfg.SetAxisEnable",
                "GetControllerError",
                "Main.M<axis>.bEnable",
                "MoveAbsolutePosition"
            ]
        );
    }

    #[test]
    fn test_axis_scoped_fields_are_runtime_motion() {
        let result = build();
        let enable = result.catalog.get("Main.M<axis>.bEnable").unwrap();
        assert_eq!(enable.template, "Main.M<axis>.bEnable=<int>");
        assert_eq!(enable.parameters[0].name, "axis");
        assert_eq!(enable.runtime_class, RuntimeClass::Runtime);
        assert_eq!(enable.category, "Motion");
    }

    #[test]
    fn test_widest_signature_wins_with_warnings() {
        let result = build();
        let foo = result.catalog.get("Cfg.Foo").unwrap();
        assert_eq!(foo.parameters.len(), 3);
        assert!(!foo.parameters[0].optional);
        assert!(foo.parameters[1].optional);
        assert!(foo.parameters[2].optional);
        assert_eq!(foo.source_ref, "devEcmcSup/com/ecmcCmdParser.c:5");

        let conflicts: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| matches!(w, BuildWarning::SignatureConflict { name, kept: 3, discarded: 1, .. } if name == "Cfg.Foo"))
            .collect();
        assert_eq!(conflicts.len(), 2);
    }

    #[test]
    fn test_docs_name_parameters_and_describe() {
        let result = build();
        let enable = result.catalog.get("Cfg.SetAxisEnable").unwrap();
        assert_eq!(enable.description, "enables or disables the given axis");
        assert_eq!(enable.template, "Cfg.SetAxisEnable(<axisId>,<enable>)");
        assert_eq!(enable.parameters[1].description, "1 enables, 0 disables.");
        assert_eq!(enable.header_source, "devEcmcSup/motion/ecmcMotion.h");
        assert_eq!(enable.runtime_class, RuntimeClass::ConfigOnly);
        assert_eq!(enable.category, "Motion");

        let err = result.catalog.get("GetControllerError").unwrap();
        assert!(err.description.is_empty());
        assert_eq!(err.runtime_class, RuntimeClass::Runtime);
        assert_eq!(err.category, "General");
    }

    #[test]
    fn test_build_is_byte_identical_across_runs() {
        let first = catalog_io::to_json(&build().into_file("devEcmcSup")).unwrap();
        let second = catalog_io::to_json(&build().into_file("devEcmcSup")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_and_three_parameter_occurrences_keep_three() {
        let src = r#"void f() { sscanf(a, "Foo(%d)"); sscanf(a, "Foo(%d,%d,%d)"); }"#;
        let result = build_catalog(&file("p.c", src), &[], &ScanOptions::default());
        assert_eq!(result.catalog.get("Foo").unwrap().parameters.len(), 3);
        assert_eq!(result.catalog.len(), 1);
    }

    #[test]
    fn test_categories_and_runtime_classes() {
        assert_eq!(category_for("Cfg.EcAddSlave", CommandForm::Call), "EtherCAT");
        assert_eq!(category_for("Cfg.CreatePLC", CommandForm::Call), "PLC");
        assert_eq!(category_for("Cfg.SetAppMode", CommandForm::Call), "Configuration");
        assert_eq!(category_for("bBusy?", CommandForm::Query), "Motion");
        assert_eq!(runtime_class_for("bBusy?", CommandForm::Query), RuntimeClass::Runtime);
        assert_eq!(runtime_class_for("WriteDataStorage", CommandForm::Call), RuntimeClass::Runtime);
        assert_eq!(runtime_class_for("ValidateConfig", CommandForm::Call), RuntimeClass::Unknown);
    }
}
