// src/cli/handlers/exec.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

use crate::{
    cli::handlers::{commons, resolve},
    core::dispatcher::{self, DispatchResult},
    models::CommandSpec,
    state::AppContext,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Sends one command to the controller and prints the readback."
)]
struct ExecArgs {
    /// Catalog command name, or the literal command text with `--raw`.
    command: String,

    /// Arguments in declared order.
    #[arg(allow_negative_numbers = true)]
    args: Vec<String>,

    /// Send `command` verbatim without a catalog lookup.
    #[arg(long)]
    raw: bool,

    /// Skip the confirmation asked for configuration commands.
    #[arg(long, short = 'y')]
    yes: bool,

    /// Axis id or motor name, resolved and passed as the axis argument.
    #[arg(long, short = 'a')]
    axis: Option<String>,

    /// Reject virtual axes.
    #[arg(long)]
    real_only: bool,

    /// Look the command up in the controller-tuning catalog (implies `--real-only`).
    #[arg(long)]
    controller: bool,

    /// Fail on a rejected virtual axis instead of offering the axis picker.
    #[arg(long)]
    no_prompt: bool,
}

/// Options shared by `exec` and `fav run`.
#[derive(Debug, Default, Clone)]
pub struct ExecOptions {
    /// Send configuration commands without asking.
    pub yes: bool,
    /// Axis id or motor name to resolve into the axis argument.
    pub axis: Option<String>,
    /// Reject virtual axes.
    pub real_only: bool,
    /// Use the controller-tuning catalog; implies `real_only`.
    pub controller: bool,
    /// Never show the axis picker after a virtual axis is rejected.
    pub no_prompt: bool,
}

/// Entry point for `exec`.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let exec_args = ExecArgs::try_parse_from(&args)?;
    if exec_args.raw {
        return execute_raw(context, &exec_args.command, exec_args.yes);
    }
    let options = ExecOptions {
        yes: exec_args.yes,
        axis: exec_args.axis,
        real_only: exec_args.real_only,
        controller: exec_args.controller,
        no_prompt: exec_args.no_prompt,
    };
    execute(context, &exec_args.command, exec_args.args, &options)
}

/// Looks up `name`, applies the blocklist and axis resolution, asks for
/// confirmation when needed, and dispatches.
pub fn execute(
    context: &AppContext,
    name: &str,
    mut args: Vec<String>,
    options: &ExecOptions,
) -> Result<()> {
    let file = context.load_catalog(options.controller)?;
    let spec = file
        .commands
        .find(name)
        .ok_or_else(|| anyhow!(t!("show.error.not_found"), name = name))?;
    refuse_blocked(context, &spec.name)?;

    if let Some(input) = options.axis.as_deref() {
        let real_only = options.real_only || options.controller;
        let selector = resolve::selector_or_default(Some(input), context)?;
        let axis = resolve::resolve_or_pick(context, &selector, real_only, !options.no_prompt)?;
        if takes_axis(spec) {
            log::debug!("Prepending {} to the arguments of '{}'", axis, spec.name);
            args.insert(0, axis.axis_id.to_string());
        }
    }

    let command = dispatcher::build_command(spec, &args).map_err(|message| {
        anyhow!(t!("exec.error.invalid_args"), template = spec.template, message = message)
    })?;
    if spec.is_config_only() && !options.yes && !confirm_config(&command)? {
        println!("{}", t!("exec.info.aborted").yellow());
        return Ok(());
    }

    let result = send(context, |d, timeout| d.dispatch(spec, &args, timeout))?;
    commons::report_dispatch(&result)
}

/// Sends `command` verbatim. The blocklist still applies to its name.
pub fn execute_raw(context: &AppContext, command: &str, yes: bool) -> Result<()> {
    let name = raw_command_name(command);
    refuse_blocked(context, name)?;
    if name.starts_with("Cfg.") && !yes && !confirm_config(command)? {
        println!("{}", t!("exec.info.aborted").yellow());
        return Ok(());
    }
    let result = send(context, |d, timeout| d.dispatch_raw(command, timeout))?;
    commons::report_dispatch(&result)
}

fn send(
    context: &AppContext,
    f: impl FnOnce(&dispatcher::Dispatcher, std::time::Duration) -> DispatchResult,
) -> Result<DispatchResult> {
    let timeout = context.timeout()?;
    let dispatcher = context.dispatchers()?.dispatcher(context.settings().endpoint()?);
    log::info!("Dispatching through {}", dispatcher.endpoint());
    Ok(f(&dispatcher, timeout))
}

fn refuse_blocked(context: &AppContext, name: &str) -> Result<()> {
    if context.is_blocked(name)? {
        return Err(anyhow!(t!("exec.error.blocked"), name = name));
    }
    Ok(())
}

fn confirm_config(command: &str) -> Result<bool> {
    commons::confirm(&format!(t!("exec.prompt.confirm_config"), command = command))
}

/// True when the first parameter is the axis index.
fn takes_axis(spec: &CommandSpec) -> bool {
    spec.parameters
        .first()
        .is_some_and(|p| p.name.to_ascii_lowercase().contains("axis"))
}

/// Command name of a literal command text: everything before `(` or `=`.
fn raw_command_name(command: &str) -> &str {
    let command = command.trim();
    let end = command.find(['(', '=']).unwrap_or(command.len());
    command.get(..end).unwrap_or(command).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{catalog_io, pv::testing::MemoryPv, settings::Settings},
        models::{Catalog, CatalogFile, CommandParameter},
    };
    use std::{fs, path::Path, sync::Arc};
    use tempfile::tempdir;

    fn write_catalog(dir: &Path) {
        let mut enable = CommandSpec::new(
            "Cfg.SetAxisEnable",
            vec![CommandParameter::named("axisId", 0), CommandParameter::named("enable", 1)],
        );
        enable.runtime_class = crate::models::RuntimeClass::ConfigOnly;
        let file = CatalogFile::new(Catalog::from_commands(vec![
            enable,
            CommandSpec::new("Cfg.EcApplyConfig", vec![CommandParameter::named("arg0", 0)]),
            CommandSpec::new("GetControllerError", vec![]),
        ]));
        catalog_io::save_catalog(&dir.join("ecmc_commands.json"), &file).unwrap();
        fs::write(dir.join("blocklist.json"), r#"["EcApplyConfig"]"#).unwrap();
    }

    fn context(dir: &Path, memory: Arc<MemoryPv>) -> AppContext {
        let settings = Settings {
            prefix: Some("IOC".into()),
            timeout: Some(0.5),
            catalog: Some(dir.join("ecmc_commands.json").display().to_string()),
            blocklist: Some(dir.join("blocklist.json").display().to_string()),
            ..Default::default()
        };
        AppContext::with_client(settings, memory)
    }

    fn chain() -> MemoryPv {
        MemoryPv::new()
            .with("IOC:MCU-Cfg-AX-FrstObjId", "4")
            .with("IOC:MCU-Cfg-AX4-Pfx", "IOC")
            .with("IOC:MCU-Cfg-AX4-Nam", "M4")
            .with("IOC:MCU-Cfg-AX4-NxtObjId", "-1")
            .with("IOC:M4-Type", "REAL")
            .with("IOC:MCU-Cmd.AINP", "OK")
    }

    #[test]
    fn test_axis_is_resolved_and_prepended() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());
        let memory = Arc::new(chain());
        let context = context(dir.path(), memory.clone());

        let args = vec![
            "Cfg.SetAxisEnable".to_string(),
            "1".to_string(),
            "--axis".to_string(),
            "M4".to_string(),
            "--yes".to_string(),
        ];
        handle(args, &context).unwrap();
        assert!(memory
            .writes()
            .contains(&("IOC:MCU-Cmd.AOUT".to_string(), "Cfg.SetAxisEnable(4,1)".to_string())));
    }

    #[test]
    fn test_virtual_axis_is_refused_without_prompt() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());
        let memory = Arc::new(chain().with("IOC:M4-Type", "VIRT"));
        let context = context(dir.path(), memory.clone());

        let args = vec![
            "Cfg.SetAxisEnable".to_string(),
            "1".to_string(),
            "--axis".to_string(),
            "4".to_string(),
            "--real-only".to_string(),
            "--no-prompt".to_string(),
            "--yes".to_string(),
        ];
        assert!(handle(args, &context).is_err());
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_blocked_command_is_refused() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());
        let memory = Arc::new(chain());
        let context = context(dir.path(), memory.clone());

        let err = handle(vec!["Cfg.EcApplyConfig".into(), "1".into(), "-y".into()], &context)
            .unwrap_err();
        assert!(err.to_string().contains("EcApplyConfig"));
        let raw = handle(vec!["--raw".into(), "Cfg.EcApplyConfig(1)".into(), "-y".into()], &context);
        assert!(raw.is_err());
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_bad_arguments_and_raw_dispatch() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());
        let memory = Arc::new(chain());
        let context = context(dir.path(), memory.clone());

        assert!(handle(vec!["GetControllerError".into(), "7".into()], &context).is_err());
        assert!(memory.writes().is_empty());

        handle(vec!["--raw".into(), "GetControllerError()".into()], &context).unwrap();
        assert_eq!(memory.writes().len(), 2);
    }

    #[test]
    fn test_missing_prefix_is_not_dispatched() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());
        let memory = Arc::new(MemoryPv::new().with("MCU-Cmd.AINP", "OK"));
        let settings = Settings {
            timeout: Some(0.5),
            catalog: Some(dir.path().join("ecmc_commands.json").display().to_string()),
            blocklist: Some(dir.path().join("blocklist.json").display().to_string()),
            ..Default::default()
        };
        let context = AppContext::with_client(settings, memory.clone());

        assert!(handle(vec!["GetControllerError".into()], &context).is_err());
        assert!(handle(vec!["--raw".into(), "GetControllerError()".into()], &context).is_err());
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_raw_command_name() {
        assert_eq!(raw_command_name(" Cfg.SetAxisEnable(1,1)"), "Cfg.SetAxisEnable");
        assert_eq!(raw_command_name("Main.M1.bEnable=1"), "Main.M1.bEnable");
        assert_eq!(raw_command_name("bBusy?"), "bBusy?");
    }
}
