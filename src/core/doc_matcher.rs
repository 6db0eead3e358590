// src/core/doc_matcher.rs

//! # Doc Matcher
//!
//! Finds `/** ... */` documentation blocks in header files and associates each
//! one with the command names it documents. A block is linked to a command by:
//!
//! 1. quoted command examples inside the block (`"Cfg.SetAxisEnable(1,1)"`),
//! 2. an explicit `Name: summary` line,
//! 3. the function declared right after the block (`int setAxisEnable(...)`).
//!
//! The first block found for a key wins. Later blocks for the same key are
//! reported as [`BuildWarning::DuplicateDoc`] and never merged.

use crate::{
    core::{scanner, sources::SourceFile},
    models::{BuildWarning, command_key},
};
use lazy_static::lazy_static;
use log::debug;
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref DOC_BLOCK_RE: Regex = Regex::new(r"(?s)/\*\*(.*?)\*/").unwrap();
    static ref LEADING_STAR_RE: Regex = Regex::new(r"^\s*\*+\s?").unwrap();
    static ref PARAM_RE: Regex = Regex::new(
        r"[\\@]param(?:\s*\[[^\]]+\])?\s+([A-Za-z_][A-Za-z0-9_]*)[\s,:.;-]*(.*)$"
    )
    .unwrap();
    static ref EXPLICIT_REF_RE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*:\s+(\S.*)$")
            .unwrap();
    static ref QUOTED_RE: Regex = Regex::new(r#""([^"\n]+)""#).unwrap();
    static ref FOLLOWING_FN_RE: Regex = Regex::new(
        r"\b(?:int|void|double|float|bool|size_t|uint64_t|uint32_t|int64_t|int32_t|char\s*\*|const\s+char\s*\*)\s+\*?([A-Za-z_][A-Za-z0-9_]*)\s*\("
    )
    .unwrap();
}

/// Words that look like `Name:` references but introduce prose sections.
const SECTION_WORDS: &[&str] = &["note", "example", "examples", "return", "returns", "warning", "see"];

/// How far past a block to look for the documented function declaration.
const FOLLOWING_FN_WINDOW: usize = 600;

/// Documentation for one parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDoc {
    /// Parameter name as written after `\param`.
    pub name: String,
    /// Text after the name, possibly empty.
    pub description: String,
}

/// Documentation extracted from one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    /// One-line description of the command.
    pub summary: String,
    /// `\param` entries in block order.
    pub params: Vec<ParamDoc>,
    /// Header path the block came from.
    pub header: String,
    /// Line the block starts on.
    pub line: usize,
    /// First command example quoted in the block, if any.
    pub example: String,
}

impl DocEntry {
    fn location(&self) -> String {
        format!("{}:{}", self.header, self.line)
    }
}

/// Documentation keyed by [`command_key`].
#[derive(Debug, Default)]
pub struct DocIndex {
    entries: BTreeMap<String, DocEntry>,
    /// Duplicate blocks that were ignored.
    pub warnings: Vec<BuildWarning>,
    /// Number of headers read.
    pub headers_scanned: usize,
}

impl DocIndex {
    /// Documentation for a command name, matched case-insensitively and
    /// ignoring any `Cfg.` prefix.
    pub fn lookup(&self, command_name: &str) -> Option<&DocEntry> {
        self.entries.get(&command_key(command_name))
    }

    /// Number of documented command keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no block documented anything.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses all headers and builds the index. Files are parsed in parallel but
/// merged in the order given, so "first block wins" only depends on input order.
pub fn match_docs(headers: &[SourceFile]) -> DocIndex {
    let parsed: Vec<Vec<(Vec<String>, DocEntry)>> =
        headers.par_iter().map(parse_header).collect();

    let mut index = DocIndex {
        headers_scanned: headers.len(),
        ..Default::default()
    };

    for (keys, entry) in parsed.into_iter().flatten() {
        for key in keys {
            match index.entries.get(&key) {
                Some(first) => {
                    debug!("Duplicate doc for '{}' at {}", key, entry.location());
                    index.warnings.push(BuildWarning::DuplicateDoc {
                        key,
                        first: first.location(),
                        location: entry.location(),
                    });
                }
                None => {
                    index.entries.insert(key, entry.clone());
                }
            }
        }
    }

    index
}

/// Extracts every documented block of one header, with the keys it documents.
fn parse_header(file: &SourceFile) -> Vec<(Vec<String>, DocEntry)> {
    let text = file.text.as_str();
    let mut out = Vec::new();

    for caps in DOC_BLOCK_RE.captures_iter(text) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let lines = clean_block(body.as_str());
        if lines.is_empty() {
            continue;
        }

        let explicit = explicit_reference(&lines);
        let summary = extract_summary(&lines, explicit.as_ref());
        if summary.is_empty() {
            continue;
        }

        let mut keys: Vec<String> = Vec::new();
        let mut push_key = |key: String| {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        };

        let examples = extract_examples(&lines);
        for name in &examples {
            push_key(command_key(name));
        }
        if let Some((name, _)) = &explicit {
            push_key(command_key(name));
        }
        if let Some(func) = following_function(text, whole.end()) {
            push_key(func.to_lowercase());
        }
        if keys.is_empty() {
            continue;
        }

        let line = text
            .get(..whole.start())
            .map_or(1, |before| before.matches('\n').count() + 1);

        out.push((
            keys,
            DocEntry {
                summary,
                params: extract_params(&lines),
                header: file.path.clone(),
                line,
                example: examples.into_iter().next().unwrap_or_default(),
            },
        ));
    }

    out
}

fn clean_block(body: &str) -> Vec<String> {
    body.lines()
        .map(|raw| LEADING_STAR_RE.replace(raw, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Reads a `Name: summary` reference. Only the first line of a block can
/// name a command; later `Units: mm/s` style lines are plain text.
fn explicit_reference(lines: &[String]) -> Option<(String, String)> {
    let caps = EXPLICIT_REF_RE.captures(lines.first()?)?;
    let name = caps.get(1)?.as_str();
    if SECTION_WORDS.contains(&name.to_lowercase().as_str()) {
        return None;
    }
    Some((name.to_string(), caps.get(2)?.as_str().trim().to_string()))
}

fn extract_summary(lines: &[String], explicit: Option<&(String, String)>) -> String {
    for line in lines {
        for tag in ["\\brief", "@brief"] {
            if let Some(pos) = line.find(tag) {
                let rest = line.get(pos + tag.len()..).unwrap_or_default().trim();
                if !rest.is_empty() {
                    return rest.to_string();
                }
            }
        }
    }

    if let Some((_, summary)) = explicit {
        return summary.clone();
    }

    lines
        .iter()
        .find(|line| {
            let low = line.to_lowercase();
            !(low.contains("command string to ecmccmdparser.c")
                || line.starts_with('"')
                || line.starts_with("- ")
                || line.starts_with('\\')
                || line.starts_with('@')
                || line.chars().count() < 8)
        })
        .cloned()
        .unwrap_or_default()
}

fn extract_params(lines: &[String]) -> Vec<ParamDoc> {
    let mut params: Vec<ParamDoc> = Vec::new();
    for line in lines {
        let Some(caps) = PARAM_RE.captures(line) else {
            continue;
        };
        let Some(name) = caps.get(1).map(|m| m.as_str().to_string()) else {
            continue;
        };
        if params.iter().any(|p| p.name == name) {
            continue;
        }
        let description = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        params.push(ParamDoc { name, description });
    }
    params
}

/// Names of the command examples quoted in a block.
fn extract_examples(lines: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    for line in lines {
        for caps in QUOTED_RE.captures_iter(line) {
            let Some(quoted) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            let looks_like_command = quoted.contains('(')
                || quoted.starts_with("Main.")
                || quoted.starts_with("ADSPORT=")
                || quoted.ends_with('?');
            if !looks_like_command {
                continue;
            }
            if let Ok(Some(sig)) = scanner::parse_signature(quoted)
                && !names.contains(&sig.name)
            {
                names.push(sig.name);
            }
        }
    }
    names
}

/// Name of the function declared shortly after `block_end`, stopping at the
/// next documentation block.
fn following_function(text: &str, block_end: usize) -> Option<String> {
    let rest = text.get(block_end..)?;
    let window: String = rest.chars().take(FOLLOWING_FN_WINDOW).collect();
    let window = match window.find("/**") {
        Some(pos) => window.get(..pos).unwrap_or_default().to_string(),
        None => window,
    };
    FOLLOWING_FN_RE
        .captures(&window)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
