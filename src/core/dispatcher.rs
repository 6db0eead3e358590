// src/core/dispatcher.rs

//! # Command Dispatcher
//!
//! Sends one command to the controller and reads back its reply:
//!
//! 1. write the command text to the command PV,
//! 2. process the query record (`<query record>.PROC = 1`),
//! 3. read the query PV.
//!
//! The exchange runs on a worker thread so the caller can give up after the
//! timeout. At most one exchange is in flight per endpoint; a second request
//! is rejected as busy, never queued. The busy flag is released when the
//! worker finishes, not when the caller stops waiting, so a late reply can
//! never interleave with the next command.

use crate::{
    constants::AXIS_SLOT,
    core::pv::{self, PvClient, PvError, names},
    models::{CommandForm, CommandSpec},
};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use scopeguard::guard;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

lazy_static! {
    static ref FLOAT_LITERAL: Regex =
        Regex::new(r"^[+-]?(?:\d+\.\d*|\.\d+)(?:[eE][+-]?\d+)?$").unwrap();
}

/// Why a dispatch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// No reply within the timeout. The command may still have been executed.
    Timeout,
    /// Another dispatch to the same endpoint is still running.
    Busy,
    /// The arguments do not fit the command signature.
    InvalidArguments,
    /// Nothing to send.
    EmptyCommand,
    /// A PV write or read failed.
    Transport,
}

impl fmt::Display for DispatchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Busy => "busy",
            Self::InvalidArguments => "invalid arguments",
            Self::EmptyCommand => "empty command",
            Self::Transport => "transport error",
        };
        f.write_str(label)
    }
}

/// Outcome of one dispatch. Failures are values, never panics or `Err`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// True when the command was sent and, for query endpoints, answered.
    pub ok: bool,
    /// The literal command text that was (or would have been) sent.
    pub command: String,
    /// Readback value, empty for write-only endpoints and failures.
    pub value: String,
    /// Set when `ok` is false.
    pub error_kind: Option<DispatchErrorKind>,
    /// Human readable failure detail.
    pub message: String,
}

impl DispatchResult {
    fn success(command: &str, value: String) -> Self {
        Self {
            ok: true,
            command: command.to_string(),
            value,
            error_kind: None,
            message: String::new(),
        }
    }

    fn failure(kind: DispatchErrorKind, command: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            command: command.to_string(),
            value: String::new(),
            error_kind: Some(kind),
            message: message.into(),
        }
    }
}

/// A command/readback PV pair. An empty query PV makes dispatch write-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// PV the command text is written to.
    pub command_pv: String,
    /// PV holding the reply. Empty for write-only endpoints.
    pub query_pv: String,
}

impl Endpoint {
    /// An endpoint from explicit PV names. Names are trimmed.
    pub fn new(command_pv: impl Into<String>, query_pv: impl Into<String>) -> Self {
        Self {
            command_pv: command_pv.into().trim().to_string(),
            query_pv: query_pv.into().trim().to_string(),
        }
    }

    /// Default `MCU-Cmd.AOUT`/`MCU-Cmd.AINP` pair under `prefix`, with optional overrides.
    pub fn from_prefix(prefix: &str, command_pv: Option<&str>, query_pv: Option<&str>) -> Self {
        Self::new(
            command_pv.map_or_else(|| names::command(prefix), str::to_string),
            query_pv.map_or_else(|| names::query(prefix), str::to_string),
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.query_pv.is_empty() {
            write!(f, "{} (write-only)", self.command_pv)
        } else {
            write!(f, "{} -> {}", self.command_pv, self.query_pv)
        }
    }
}

/// Sends commands to one endpoint, at most one at a time.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Arc<dyn PvClient>,
    endpoint: Endpoint,
    in_flight: Arc<AtomicBool>,
}

impl Dispatcher {
    /// A dispatcher with its own busy flag. Use [`DispatcherRegistry`] when
    /// several dispatchers may target the same endpoint.
    pub fn new(client: Arc<dyn PvClient>, endpoint: Endpoint) -> Self {
        Self {
            client,
            endpoint,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The PV pair this dispatcher talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// True while an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Builds the command text from `spec` and `args`, then dispatches it.
    pub fn dispatch(&self, spec: &CommandSpec, args: &[String], timeout: Duration) -> DispatchResult {
        match build_command(spec, args) {
            Ok(command) => self.dispatch_raw(&command, timeout),
            Err(message) => DispatchResult::failure(DispatchErrorKind::InvalidArguments, &spec.name, message),
        }
    }

    /// Sends `command` verbatim.
    pub fn dispatch_raw(&self, command: &str, timeout: Duration) -> DispatchResult {
        let command = command.trim();
        if command.is_empty() {
            return DispatchResult::failure(DispatchErrorKind::EmptyCommand, command, "command is empty");
        }
        if self.endpoint.command_pv.is_empty() {
            return DispatchResult::failure(DispatchErrorKind::Transport, command, "command PV is empty");
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejecting '{}': {} is busy", command, self.endpoint);
            return DispatchResult::failure(
                DispatchErrorKind::Busy,
                command,
                format!("a command is already in flight on {}", self.endpoint),
            );
        }

        let (tx, rx) = mpsc::channel();
        let client = Arc::clone(&self.client);
        let endpoint = self.endpoint.clone();
        let flag = Arc::clone(&self.in_flight);
        let text = command.to_string();

        let spawned = thread::Builder::new()
            .name("ecmc-dispatch".into())
            .spawn(move || {
                let release = guard(flag, |flag| flag.store(false, Ordering::Release));
                let outcome = exchange(client.as_ref(), &endpoint, &text, timeout);
                drop(release);
                // The caller may have stopped waiting; a closed channel is fine.
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            self.in_flight.store(false, Ordering::Release);
            return DispatchResult::failure(DispatchErrorKind::Transport, command, e.to_string());
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => {
                debug!("'{}' -> '{}'", command, value);
                DispatchResult::success(command, value)
            }
            Ok(Err(PvError::Timeout { pv, .. })) => DispatchResult::failure(
                DispatchErrorKind::Timeout,
                command,
                format!("no response from '{}' within {:?}", pv, timeout),
            ),
            Ok(Err(e)) => DispatchResult::failure(DispatchErrorKind::Transport, command, e.to_string()),
            Err(RecvTimeoutError::Timeout) => {
                warn!("No readback for '{}' within {:?}; outcome unknown", command, timeout);
                DispatchResult::failure(
                    DispatchErrorKind::Timeout,
                    command,
                    format!("no response within {:?}", timeout),
                )
            }
            Err(RecvTimeoutError::Disconnected) => DispatchResult::failure(
                DispatchErrorKind::Transport,
                command,
                "dispatch worker ended without a result",
            ),
        }
    }
}

/// Write, process, read. Runs on the worker thread.
fn exchange(client: &dyn PvClient, endpoint: &Endpoint, command: &str, timeout: Duration) -> Result<String, PvError> {
    debug!("put {} = '{}'", endpoint.command_pv, command);
    client.put(&endpoint.command_pv, command, timeout)?;
    if endpoint.query_pv.is_empty() {
        return Ok(String::new());
    }
    let proc_pv = pv::proc_pv_for(&endpoint.query_pv);
    debug!("put {} = 1", proc_pv);
    client.put(&proc_pv, "1", timeout)?;
    let value = client.get(&endpoint.query_pv, timeout)?;
    Ok(value.trim().to_string())
}

/// Hands out dispatchers that share one busy flag per endpoint.
#[derive(Debug)]
pub struct DispatcherRegistry {
    client: Arc<dyn PvClient>,
    flags: Mutex<HashMap<Endpoint, Arc<AtomicBool>>>,
}

impl DispatcherRegistry {
    /// An empty registry over `client`.
    pub fn new(client: Arc<dyn PvClient>) -> Self {
        Self {
            client,
            flags: Mutex::new(HashMap::new()),
        }
    }

    /// A dispatcher for `endpoint` sharing the busy flag of every other dispatcher for it.
    pub fn dispatcher(&self, endpoint: Endpoint) -> Dispatcher {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        let in_flight = Arc::clone(flags.entry(endpoint.clone()).or_default());
        Dispatcher {
            client: Arc::clone(&self.client),
            endpoint,
            in_flight,
        }
    }
}

/// Renders the literal command text for `spec` with `args` in declared order.
/// Trailing optional arguments that are omitted (or empty) are dropped.
pub fn build_command(spec: &CommandSpec, args: &[String]) -> Result<String, String> {
    let mut args: Vec<&str> = args.iter().map(|a| a.trim()).collect();
    while args.last().is_some_and(|a| a.is_empty()) {
        args.pop();
    }

    let (name, args) = if spec.is_axis_scoped() {
        let Some((axis, rest)) = args.split_first() else {
            return Err("missing required argument 'axis'".to_string());
        };
        if axis.parse::<u32>().is_err() {
            return Err(format!("'{}' is not an axis id", axis));
        }
        (spec.name.replacen(AXIS_SLOT, axis, 1), rest)
    } else {
        (spec.name.clone(), args.as_slice())
    };
    let parameters = spec.value_parameters();

    match spec.form {
        CommandForm::Query => {
            if !args.is_empty() {
                return Err(format!("'{}' takes no arguments", spec.name));
            }
            Ok(name)
        }
        CommandForm::Assign => match args {
            [value] => Ok(format!("{}={}", name, normalize_float_literal(value))),
            _ => Err(format!("'{}' takes exactly one value", spec.name)),
        },
        CommandForm::Call => {
            if args.len() > parameters.len() {
                return Err(format!(
                    "'{}' takes at most {} argument(s), got {}",
                    spec.name,
                    parameters.len(),
                    args.len()
                ));
            }
            let mut rendered = Vec::with_capacity(args.len());
            for (param, arg) in parameters.iter().zip(args.iter()) {
                if arg.is_empty() {
                    return Err(format!(
                        "'{}' is empty but later arguments are given",
                        param.name
                    ));
                }
                rendered.push(normalize_float_literal(arg));
            }
            if let Some(missing) = parameters.iter().skip(args.len()).find(|p| !p.optional) {
                return Err(format!("missing required argument '{}'", missing.name));
            }
            Ok(format!("{}({})", name, rendered.join(",")))
        }
    }
}

/// Shortens a float literal: `1.500` -> `1.5`, `0.30` -> `.3`, `2.0` -> `2`.
/// Anything that is not a plain float literal is returned unchanged.
pub fn normalize_float_literal(token: &str) -> String {
    let token = token.trim();
    if !FLOAT_LITERAL.is_match(token) {
        return token.to_string();
    }
    let (base, exponent) = match token.find(['e', 'E']) {
        Some(i) => token.split_at(i),
        None => (token, ""),
    };
    let (sign, base) = match base.strip_prefix(['+', '-']) {
        Some(rest) => base.split_at(base.len() - rest.len()),
        None => ("", base),
    };
    let Some((int_part, frac_part)) = base.split_once('.') else {
        return token.to_string();
    };
    let frac_part = frac_part.trim_end_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if frac_part.is_empty() {
        format!("{}{}{}", sign, int_part, exponent)
    } else {
        let int_part = if int_part == "0" { "" } else { int_part };
        format!("{}{}.{}{}", sign, int_part, frac_part, exponent)
    }
}
