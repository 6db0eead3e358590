// src/cli/handlers/commons.rs

// Shared helpers used by multiple handlers.

use anyhow::{Result, anyhow};
use colored::*;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};

use crate::{
    core::{axis_resolver::AxisResolver, dispatcher::DispatchResult},
    models::{AxisIdentity, BuildWarning},
    state::AppContext,
};

/// Runs `f` with a resolver bound to the context's client, prefix and timeout.
pub fn with_resolver<T>(
    context: &AppContext,
    f: impl FnOnce(&AxisResolver<'_>) -> Result<T>,
) -> Result<T> {
    let client = context.pv_client()?;
    let resolver = AxisResolver::new(
        client.as_ref(),
        context.settings().prefix(),
        context.timeout()?,
    );
    f(&resolver)
}

/// One line per axis: id, motor record and real/virtual marker.
pub fn format_axis(axis: &AxisIdentity) -> String {
    let kind = if axis.is_virtual {
        t!("common.axis.virtual").yellow()
    } else {
        t!("common.axis.real").green()
    };
    let record = if axis.motor_prefix.is_empty() {
        t!("common.axis.unnamed").dimmed().to_string()
    } else {
        axis.motor_prefix.clone()
    };
    format!("{:>4}  {:<32} {}", axis.axis_id.to_string().cyan(), record, kind)
}

/// Interactive axis picker. Returns `None` if the list is empty or the user aborts.
pub fn pick_axis(axes: &[AxisIdentity]) -> Result<Option<AxisIdentity>> {
    if axes.is_empty() {
        return Ok(None);
    }
    let items: Vec<String> = axes.iter().map(format_axis).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("common.prompt.pick_axis"))
        .items(&items)
        .default(0)
        .interact_opt()?;
    Ok(selection.and_then(|i| axes.get(i).cloned()))
}

/// Yes/no prompt defaulting to "no".
pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Prints build warnings as a list on stderr.
pub fn print_warnings(warnings: &[BuildWarning]) {
    if warnings.is_empty() {
        return;
    }
    eprintln!(
        "\n{}",
        format!(t!("common.warning.header"), count = warnings.len())
            .yellow()
            .bold()
    );
    for warning in warnings {
        eprintln!("  {} {}", "-".yellow(), warning);
    }
}

/// Prints a successful readback, or turns a failed dispatch into an error
/// naming its kind.
pub fn report_dispatch(result: &DispatchResult) -> Result<()> {
    if result.ok {
        println!("{} {}", "->".dimmed(), result.command.cyan());
        if result.value.is_empty() {
            println!("{}", t!("common.dispatch.no_readback").dimmed());
        } else {
            println!("{}", result.value.bold());
        }
        return Ok(());
    }
    let kind = result
        .error_kind
        .map(|k| k.to_string())
        .unwrap_or_default();
    Err(anyhow!(
        t!("common.dispatch.failed"),
        command = result.command,
        kind = kind,
        message = result.message
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::DispatchErrorKind;

    fn axis(id: u32, record: &str, is_virtual: bool) -> AxisIdentity {
        AxisIdentity {
            axis_id: id,
            prefix: "IOC".into(),
            motor_prefix: record.into(),
            motor_name: record.rsplit(':').next().unwrap_or_default().into(),
            is_virtual,
        }
    }

    #[test]
    fn test_format_axis_mentions_record() {
        colored::control::set_override(false);
        let line = format_axis(&axis(3, "IOC:M3", false));
        assert!(line.contains("IOC:M3"));
        assert!(line.contains('3'));
    }

    #[test]
    fn test_failed_dispatch_names_the_kind() {
        let result = DispatchResult {
            ok: false,
            command: "GetControllerError()".into(),
            value: String::new(),
            error_kind: Some(DispatchErrorKind::Busy),
            message: "in flight".into(),
        };
        let err = report_dispatch(&result).unwrap_err().to_string();
        assert!(err.contains("busy"));
        assert!(err.contains("GetControllerError()"));
    }

    #[test]
    fn test_pick_axis_on_empty_list() {
        assert!(pick_axis(&[]).unwrap().is_none());
    }
}
