// src/core/scanner.rs

//! # Source Scanner
//!
//! Extracts command signatures from a controller's parser source. The parser
//! recognizes commands by matching the incoming text against format strings
//! (`sscanf(myarg_1, "Cfg.SetAxisEnable(%d,%d)", ...)`, `strcmp(myarg_1, "...")`),
//! so every string literal passed to one of those matcher calls is a candidate
//! signature.
//!
//! The scanner emits one [`ScannedCommand`] per occurrence. Deduplication and
//! signature reconciliation happen later in the catalog builder.

use crate::{
    constants::{AXIS_SCOPED_HEAD, AXIS_SLOT, CONFIG_HANDLER_FUNCTION},
    core::lexer::{self, Token, TokenKind},
    models::{BuildWarning, CommandForm, CommandParameter},
};
use log::{debug, trace};

/// Controls which literals count as command signatures.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Calls whose string arguments are candidate signatures. Empty means every literal.
    pub matcher_calls: Vec<String>,
    /// Functions whose body handles configuration commands (`Cfg.` prefix implied).
    pub config_scope_functions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            matcher_calls: vec!["sscanf".into(), "strcmp".into(), "strncmp".into()],
            config_scope_functions: vec![CONFIG_HANDLER_FUNCTION.into()],
        }
    }
}

/// One occurrence of a command signature in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedCommand {
    /// Command name as matched, e.g. `SetAxisEnable` or `Main.M<axis>.bBusy?`.
    pub name: String,
    /// Call, query or assignment.
    pub form: CommandForm,
    /// Slots in call order.
    pub parameters: Vec<CommandParameter>,
    /// Normalized signature text, e.g. `Cfg.SetAxisEnable(<int>,<int>)`.
    pub signature: String,
    /// Line of the literal in the parser source.
    pub line: usize,
    /// True inside the configuration handler.
    pub in_config_scope: bool,
}

/// Result of scanning one source file.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Every accepted occurrence, in source order.
    pub commands: Vec<ScannedCommand>,
    /// Lexer anomalies and malformed signatures.
    pub warnings: Vec<BuildWarning>,
}

/// A parsed signature, before location information is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Command name, with the `<axis>` slot for axis-scoped fields.
    pub name: String,
    /// Call, query or assignment.
    pub form: CommandForm,
    /// Slots in call order.
    pub parameters: Vec<CommandParameter>,
}

impl Signature {
    /// Normalized textual form with every slot rendered as `<hint-or-name>`.
    pub fn normalized(&self) -> String {
        let skip = usize::from(self.name.contains(AXIS_SLOT));
        let slots: Vec<String> = self
            .parameters
            .iter()
            .skip(skip)
            .map(|p| format!("<{}>", p.hint.as_deref().unwrap_or(&p.name)))
            .collect();
        match self.form {
            CommandForm::Call => format!("{}({})", self.name, slots.join(",")),
            CommandForm::Query => self.name.clone(),
            CommandForm::Assign => format!("{}={}", self.name, slots.join(",")),
        }
    }
}

/// Scans the text of a parser source file.
pub fn scan_source(text: &str, origin: &str, options: &ScanOptions) -> ScanReport {
    let stream = lexer::tokenize(text, origin);
    let mut report = ScanReport {
        commands: Vec::new(),
        warnings: stream.warnings,
    };

    for (literal, line, scope) in candidate_literals(&stream.tokens, options) {
        let in_config_scope = scope
            .as_deref()
            .is_some_and(|f| options.config_scope_functions.iter().any(|c| c == f));
        match parse_signature(&literal) {
            Ok(Some(sig)) => {
                trace!("{}:{}: found signature '{}'", origin, line, sig.normalized());
                report.commands.push(ScannedCommand {
                    signature: sig.normalized(),
                    name: sig.name,
                    form: sig.form,
                    parameters: sig.parameters,
                    line,
                    in_config_scope,
                });
            }
            Ok(None) => {}
            Err(message) => {
                debug!("{}:{}: skipped '{}': {}", origin, line, literal, message);
                report.warnings.push(BuildWarning::parse(
                    format!("{}:{}", origin, line),
                    format!("{} in '{}'", message, literal),
                ));
            }
        }
    }

    report
}

/// Walks the token stream and yields `(literal, line, enclosing_function)` for
/// every string literal that is an argument of a matcher call.
///
/// Adjacent literals are concatenated and format macros between them
/// (`"%" PRIu64 ")"`) are folded in as `%PRIu64`.
fn candidate_literals(
    tokens: &[Token],
    options: &ScanOptions,
) -> Vec<(String, usize, Option<String>)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current_fn: Option<String> = None;
    let mut pending_fn: Option<String> = None;
    // Stack of open parentheses; each entry says whether it belongs to a matcher call.
    let mut paren_stack: Vec<bool> = Vec::new();
    let mut prev_ident: Option<&str> = None;

    let mut i = 0usize;
    while let Some(tok) = tokens.get(i) {
        match &tok.kind {
            TokenKind::Punct('{') => {
                if depth == 0 {
                    current_fn = pending_fn.take();
                }
                depth += 1;
                paren_stack.clear();
            }
            TokenKind::Punct('}') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    current_fn = None;
                }
                paren_stack.clear();
            }
            TokenKind::Punct('(') => {
                let is_matcher = prev_ident.is_some_and(|name| {
                    options.matcher_calls.is_empty()
                        || options.matcher_calls.iter().any(|m| m == name)
                });
                if depth == 0 && paren_stack.is_empty() {
                    pending_fn = prev_ident.map(str::to_string);
                }
                paren_stack.push(is_matcher);
            }
            TokenKind::Punct(')') => {
                paren_stack.pop();
            }
            TokenKind::Str(first) => {
                let mut literal = first.clone();
                let line = tok.line;
                // Fold `"..." MACRO "..."` sequences into one literal.
                while let Some(next) = tokens.get(i + 1) {
                    match &next.kind {
                        TokenKind::Str(more) => {
                            literal.push_str(more);
                            i += 1;
                        }
                        TokenKind::Ident(name)
                            if is_format_macro(name)
                                && matches!(
                                    tokens.get(i + 2).map(|t| &t.kind),
                                    Some(TokenKind::Str(_))
                                ) =>
                        {
                            literal.push_str(name);
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let inside_matcher = paren_stack.last().copied().unwrap_or(false);
                let accept_all = options.matcher_calls.is_empty();
                if inside_matcher || accept_all {
                    out.push((literal, line, current_fn.clone()));
                }
            }
            _ => {}
        }
        prev_ident = match &tok.kind {
            TokenKind::Ident(name) => Some(name.as_str()),
            _ => None,
        };
        i += 1;
    }

    out
}

fn is_format_macro(name: &str) -> bool {
    (name.starts_with("PRI") || name.starts_with("SCN")) && name.len() > 3
}

/// Parses one literal into a command signature.
///
/// Returns `Ok(None)` when the literal is plainly not a command (empty, a bare
/// format directive, free text) and `Err` with a message when it looks like a
/// command but is malformed.
pub fn parse_signature(raw: &str) -> Result<Option<Signature>, String> {
    let text = collapse_whitespace(raw);
    if text.is_empty() || text.starts_with('%') {
        return Ok(None);
    }
    if let Some(field) = text
        .strip_prefix(AXIS_SCOPED_HEAD)
        .and_then(|rest| rest.strip_prefix("%d."))
    {
        return parse_axis_scoped(field);
    }

    let (head, form, tail) = match text.find(['(', '=', '?']) {
        Some(pos) => {
            let (head, rest) = text.split_at(pos);
            match rest.chars().next() {
                Some('(') => (head, CommandForm::Call, rest),
                Some('=') => (head, CommandForm::Assign, rest),
                _ => (head, CommandForm::Query, rest),
            }
        }
        None => return Ok(None),
    };

    if head.is_empty() || head.contains(' ') {
        // Free text such as "Error (%d)" or "= value".
        return Ok(None);
    }
    if head.contains('%') {
        return Err("format directive inside command name".to_string());
    }
    if !is_command_name(head) {
        return Ok(None);
    }

    match form {
        CommandForm::Query => {
            if tail.trim() != "?" {
                return Err("unexpected text after '?'".to_string());
            }
            Ok(Some(Signature {
                name: format!("{}?", head),
                form,
                parameters: Vec::new(),
            }))
        }
        CommandForm::Assign => {
            let rhs = tail.get(1..).unwrap_or_default().trim();
            let slots = if rhs.is_empty() {
                Vec::new()
            } else {
                split_top_level(rhs)?
            };
            Ok(Some(Signature {
                name: head.to_string(),
                form,
                parameters: slots_to_parameters(&slots)?,
            }))
        }
        CommandForm::Call => {
            let close = matching_paren(tail).ok_or("unterminated argument list")?;
            let inner = tail.get(1..close).unwrap_or_default();
            let rest = tail.get(close + 1..).unwrap_or_default().trim();
            if !rest.is_empty() {
                return Err(format!("unexpected text '{}' after argument list", rest));
            }
            let slots = if inner.trim().is_empty() {
                Vec::new()
            } else {
                split_top_level(inner)?
            };
            Ok(Some(Signature {
                name: head.to_string(),
                form,
                parameters: slots_to_parameters(&slots)?,
            }))
        }
    }
}

/// `Main.M%d.<field>...`: the axis id becomes the leading `axis` parameter and
/// the name keeps an `<axis>` slot, e.g. `Main.M<axis>.bEnable`.
fn parse_axis_scoped(field: &str) -> Result<Option<Signature>, String> {
    let Some(mut sig) = parse_signature(field)? else {
        return Ok(None);
    };
    if sig.form == CommandForm::Call {
        return Err("argument list on an axis-scoped field".to_string());
    }
    sig.name = format!("{}{}.{}", AXIS_SCOPED_HEAD, AXIS_SLOT, sig.name);
    let mut axis = CommandParameter::named("axis", 0);
    axis.hint = Some("int".to_string());
    for param in &mut sig.parameters {
        param.order += 1;
    }
    sig.parameters.insert(0, axis);
    Ok(Some(sig))
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `Ident(.Ident)*`
fn is_command_name(name: &str) -> bool {
    name.split('.').all(|segment| {
        let mut chars = segment.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Byte index of the `)` closing the `(` at index 0, honoring nesting.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas that are not nested inside parentheses, brackets or quotes.
fn split_top_level(text: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quote = false;

    for c in text.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            '(' | '[' if !in_quote => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' if !in_quote => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced ')' in argument list".to_string());
                }
                current.push(c);
            }
            ',' if depth == 0 && !in_quote => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err("unbalanced brackets in argument list".to_string());
    }
    parts.push(current.trim().to_string());
    Ok(parts)
}

fn slots_to_parameters(slots: &[String]) -> Result<Vec<CommandParameter>, String> {
    slots
        .iter()
        .enumerate()
        .map(|(order, slot)| parse_slot(slot, order))
        .collect()
}

/// Interprets one argument slot of a signature.
fn parse_slot(slot: &str, order: usize) -> Result<CommandParameter, String> {
    if slot.is_empty() {
        return Err(format!("empty argument slot at position {}", order + 1));
    }

    // `[name]` marks an optional slot.
    if let Some(inner) = slot.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let mut param = parse_slot(inner.trim(), order)?;
        param.optional = true;
        return Ok(param);
    }

    // `name=default` also marks an optional slot; the default may nest parentheses.
    if let Some((name, default)) = slot.split_once('=')
        && is_command_name(name.trim())
        && !name.contains('%')
    {
        let mut param = CommandParameter::named(name.trim(), order);
        param.optional = true;
        param.default = Some(default.trim().to_string());
        return Ok(param);
    }

    if let Some(name) = slot.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        let mut param = CommandParameter::named(name.trim(), order);
        if is_hint_name(name.trim()) {
            param.hint = Some(name.trim().to_string());
        }
        return Ok(param);
    }

    if let Some(hint) = directive_hint(slot) {
        let mut param = CommandParameter::named(hint, order);
        param.hint = Some(hint.to_string());
        return Ok(param);
    }

    if is_command_name(slot) {
        return Ok(CommandParameter::named(slot, order));
    }

    let mut param = CommandParameter::named(format!("arg{}", order + 1), order);
    param.default = Some(slot.to_string());
    Ok(param)
}

fn is_hint_name(name: &str) -> bool {
    matches!(
        name,
        "int" | "uint" | "float" | "hex" | "char" | "str" | "expr" | "i64" | "u64" | "hex64"
    )
}

/// Maps the first `printf`/`scanf` directive found in `slot` to a type hint.
fn directive_hint(slot: &str) -> Option<&'static str> {
    let pos = slot.find('%')?;
    let directive = slot.get(pos + 1..)?;

    const TABLE: &[(&str, &str)] = &[
        ("SCNd64", "i64"),
        ("SCNu64", "u64"),
        ("SCNx64", "hex64"),
        ("PRId64", "i64"),
        ("PRIu64", "u64"),
        ("PRIx64", "hex64"),
        ("[^\\n]", "expr"),
        ("[^", "str"),
        ("lf", "float"),
        ("lld", "i64"),
        ("llu", "u64"),
        ("d", "int"),
        ("i", "int"),
        ("u", "uint"),
        ("f", "float"),
        ("g", "float"),
        ("x", "hex"),
        ("c", "char"),
        ("s", "str"),
    ];
    TABLE
        .iter()
        .find(|(prefix, _)| directive.starts_with(prefix))
        .map(|(_, hint)| *hint)
}
