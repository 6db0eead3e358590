// src/models.rs

//! Shared data model: catalog entries, axis identities, favorites, and the
//! warnings produced while building a catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// --- CATALOG MODELS ---

/// One parameter slot of a controller command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandParameter {
    /// Documented name, or a placeholder such as `arg1`.
    pub name: String,
    /// May be left out; only trailing slots are optional.
    #[serde(default)]
    pub optional: bool,
    /// Zero-based position in the call.
    #[serde(default)]
    pub order: usize,
    /// Type hint taken from the parser's format directive (`int`, `float`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Default written in the signature, e.g. `acc=max`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Parameter documentation from the header.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl CommandParameter {
    /// Creates a required parameter with no hint.
    pub fn named(name: impl Into<String>, order: usize) -> Self {
        Self {
            name: name.into(),
            optional: false,
            order,
            hint: None,
            default: None,
            description: String::new(),
        }
    }

    /// Returns true if the parameter looks numeric according to its hint.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.hint.as_deref(),
            Some("int" | "uint" | "float" | "hex" | "i64" | "u64" | "hex64")
        )
    }
}

/// Syntactic shape of a command string.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandForm {
    /// `Name(arg, arg, ...)`
    #[default]
    Call,
    /// `Name?`
    Query,
    /// `Name=value`
    Assign,
}

/// Conservative classification of when a command may be issued.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeClass {
    /// Configuration phase only (`Cfg.*`).
    ConfigOnly,
    /// Safe to issue while the controller is running.
    Runtime,
    /// Not classified.
    #[default]
    Unknown,
}

impl RuntimeClass {
    /// Human readable note shown next to the classification.
    pub fn note(self) -> &'static str {
        match self {
            Self::ConfigOnly => {
                "Configuration command; typically intended before entering runtime mode."
            }
            Self::Runtime => "Runtime command or status query.",
            Self::Unknown => {
                "Runtime behavior not clearly guaranteed; verify for your application state."
            }
        }
    }
}

/// A single catalog entry. `name` is unique within a catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    /// Unique name callers use, including any `Cfg.` prefix.
    pub name: String,
    /// How arguments are written after the name.
    #[serde(default)]
    pub form: CommandForm,
    /// Slots in call order.
    #[serde(default)]
    pub parameters: Vec<CommandParameter>,
    /// Summary from the header docs.
    #[serde(default)]
    pub description: String,
    /// `file:line` of the signature kept.
    #[serde(default)]
    pub source_ref: String,
    /// Human-facing signature such as `Cfg.SetAxisEnable(<axisId>,<enable>)`.
    #[serde(default)]
    pub template: String,
    /// Coarse group for listing.
    #[serde(default)]
    pub category: String,
    /// Whether the command is safe at runtime.
    #[serde(default)]
    pub runtime_class: RuntimeClass,
    /// Header the description came from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub header_source: String,
    /// Example command quoted in the header block.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub header_example: String,
}

impl CommandSpec {
    /// Creates a bare call-form spec. Mostly useful for callers building
    /// commands by hand and for tests.
    pub fn new(name: impl Into<String>, parameters: Vec<CommandParameter>) -> Self {
        let mut spec = Self {
            name: name.into(),
            form: CommandForm::Call,
            parameters,
            description: String::new(),
            source_ref: String::new(),
            template: String::new(),
            category: String::new(),
            runtime_class: RuntimeClass::Unknown,
            header_source: String::new(),
            header_example: String::new(),
        };
        spec.template = spec.render_template();
        spec
    }

    /// Number of parameters that must always be supplied.
    pub fn required_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.optional).count()
    }

    /// Renders the human-facing template, e.g. `Cfg.SetAxisEnable(<axisId>,<enable>)`.
    pub fn render_template(&self) -> String {
        let slots: Vec<String> = self
            .value_parameters()
            .iter()
            .map(|p| {
                if p.optional {
                    format!("[<{}>]", p.name)
                } else {
                    format!("<{}>", p.name)
                }
            })
            .collect();
        match self.form {
            CommandForm::Call => format!("{}({})", self.name, slots.join(",")),
            CommandForm::Query => self.name.clone(),
            CommandForm::Assign => format!("{}={}", self.name, slots.join(",")),
        }
    }

    /// True for axis-scoped commands such as `Main.M<axis>.bEnable`, whose
    /// first parameter fills the `<axis>` slot of the name.
    pub fn is_axis_scoped(&self) -> bool {
        self.name.contains(crate::constants::AXIS_SLOT)
    }

    /// Parameters written after the name, i.e. all but the axis slot of an
    /// axis-scoped command.
    pub fn value_parameters(&self) -> &[CommandParameter] {
        if self.is_axis_scoped() {
            self.parameters.get(1..).unwrap_or_default()
        } else {
            &self.parameters
        }
    }

    /// True for commands that only make sense during the configuration phase.
    pub fn is_config_only(&self) -> bool {
        self.runtime_class == RuntimeClass::ConfigOnly || self.name.starts_with("Cfg.")
    }
}

/// An ordered, name-unique collection of command specs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Catalog {
    commands: Vec<CommandSpec>,
}

impl Catalog {
    /// Builds a catalog, dropping later entries whose name was already seen.
    pub fn from_commands(commands: Vec<CommandSpec>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let commands = commands
            .into_iter()
            .filter(|c| seen.insert(c.name.clone()))
            .collect();
        Self { commands }
    }

    /// Entries in catalog order.
    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Iterates entries in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, CommandSpec> {
        self.commands.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True for an empty catalog.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Looks up a command by exact name.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Looks up a command by exact name first, then case-insensitively with or
    /// without the `Cfg.` prefix.
    pub fn find(&self, name: &str) -> Option<&CommandSpec> {
        if let Some(spec) = self.get(name) {
            return Some(spec);
        }
        let wanted = command_key(name);
        self.commands.iter().find(|c| command_key(&c.name) == wanted)
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CommandSpec;
    type IntoIter = std::slice::Iter<'a, CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Lookup key used to match commands across parser and header sources:
/// lowercase, without the `Cfg.` prefix.
pub fn command_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    match lowered.strip_prefix("cfg.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

/// Provenance block written at the top of a generated catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFrom {
    /// Parser source the catalog was built from.
    pub parser: String,
    /// Root the header paths are relative to.
    #[serde(default)]
    pub headers_root: String,
    /// Number of headers read for documentation.
    #[serde(default)]
    pub header_count_scanned: usize,
}

/// On-disk envelope of a catalog. Unknown fields are ignored on read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    /// Provenance, set for catalogs built from source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_from: Option<GeneratedFrom>,
    /// Consumer a derived catalog was made for, e.g. `controller-tuning`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_for: Option<String>,
    /// Policy labels a derived catalog was filtered with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<String>,
    /// Content hash of the base catalog a derived catalog was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    /// Number of entries in `commands` when written.
    #[serde(default)]
    pub command_count: usize,
    /// Required on read, so an object without it is rejected rather than
    /// taken for an empty catalog.
    pub commands: Catalog,
}

impl CatalogFile {
    /// An envelope around `commands` with no provenance.
    pub fn new(commands: Catalog) -> Self {
        Self {
            command_count: commands.len(),
            commands,
            ..Default::default()
        }
    }
}

// --- AXIS MODELS ---

/// Canonical identity of one configured controller axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisIdentity {
    /// Controller axis index.
    pub axis_id: u32,
    /// Value of the axis' `-Pfx` configuration PV.
    pub prefix: String,
    /// Full motor record base, e.g. `IOC:M1`.
    pub motor_prefix: String,
    /// Value of the axis' `-Nam` configuration PV.
    pub motor_name: String,
    /// True unless `<motor>-Type` reads `REAL`.
    pub is_virtual: bool,
}

impl fmt::Display for AxisIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_virtual { "virtual" } else { "real" };
        write!(f, "axis {} ({}, {})", self.axis_id, self.motor_prefix, kind)
    }
}

// --- FAVORITES ---

/// A saved command invocation. Arguments of the form `<name>` are placeholders
/// filled in when the favorite is run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    /// Catalog name of the command.
    pub command_name: String,
    /// Arguments, possibly with `<name>` placeholders.
    #[serde(default)]
    pub argument_template: Vec<String>,
}

impl Favorite {
    /// Names of the placeholders in the argument template, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        self.argument_template
            .iter()
            .filter_map(|arg| placeholder_name(arg))
            .collect()
    }

    /// Replaces each placeholder, in order, with the next supplied value.
    /// Returns `None` if fewer values than placeholders were supplied.
    pub fn fill(&self, values: &[String]) -> Option<Vec<String>> {
        let mut values = values.iter();
        self.argument_template
            .iter()
            .map(|arg| match placeholder_name(arg) {
                Some(_) => values.next().cloned(),
                None => Some(arg.clone()),
            })
            .collect()
    }
}

fn placeholder_name(arg: &str) -> Option<&str> {
    arg.trim()
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .filter(|name| !name.is_empty())
}

// --- BUILD DIAGNOSTICS ---

/// Non-fatal anomaly recorded while scanning sources or matching documentation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// A construct in a source or header file could not be understood and was skipped.
    #[error("{location}: {message}")]
    Parse { location: String, message: String },
    /// Two occurrences of one command disagree on their parameter count.
    #[error(
        "{location}: signature conflict for '{name}': kept {kept} parameter(s), discarded {discarded}"
    )]
    SignatureConflict {
        name: String,
        kept: usize,
        discarded: usize,
        location: String,
    },
    /// A later documentation block for an already documented command was ignored.
    #[error("{location}: duplicate documentation for '{key}' ignored (first from {first})")]
    DuplicateDoc {
        key: String,
        first: String,
        location: String,
    },
}

impl BuildWarning {
    /// A [`BuildWarning::Parse`] at `location`.
    pub fn parse(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.into(),
        }
    }
}
