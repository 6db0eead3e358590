// src/cli/handlers/probe.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

use crate::{
    cli::handlers::{commons, resolve},
    core::axis_resolver::{AxisSelector, ProbeOutcome},
    models::AxisIdentity,
    state::AppContext,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Checks an axis with one cheap read, offering a picker when it does not answer."
)]
struct ProbeArgs {
    /// Axis id. Defaults to the configured axis id.
    axis_id: Option<u32>,

    /// Report the probe result without offering the axis picker.
    #[arg(long)]
    no_prompt: bool,

    /// Only offer real axes in the picker.
    #[arg(long)]
    real_only: bool,
}

/// Probes the given or configured axis.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let probe_args = ProbeArgs::try_parse_from(&args)?;
    let axis_id = probe_args
        .axis_id
        .or(context.settings().axis_id)
        .ok_or_else(|| anyhow!(t!("resolve.error.no_selector")))?;

    match probe_axis(context, axis_id, probe_args.real_only, !probe_args.no_prompt)? {
        Some(axis) => {
            println!("{}", commons::format_axis(&axis));
            Ok(())
        }
        None => Err(anyhow!(t!("probe.error.no_axis"), id = axis_id)),
    }
}

/// Probes `axis_id` and resolves it when the probe answers. Otherwise the
/// operator may pick another axis from the discovered chain.
pub fn probe_axis(
    context: &AppContext,
    axis_id: u32,
    real_only: bool,
    allow_prompt: bool,
) -> Result<Option<AxisIdentity>> {
    let outcome = commons::with_resolver(context, |resolver| Ok(resolver.probe(axis_id)))?;
    match outcome {
        ProbeOutcome::Ready(value) => {
            log::info!("Axis {} answered with prefix '{}'", axis_id, value);
            let axis = resolve::resolve(context, &AxisSelector::by_id(axis_id), real_only)?;
            Ok(Some(axis))
        }
        ProbeOutcome::PromptSelection(reason) => {
            eprintln!(
                "{}",
                format!(t!("probe.warning.unanswered"), id = axis_id, reason = reason).yellow()
            );
            if !allow_prompt {
                return Ok(None);
            }
            let axes = commons::with_resolver(context, |resolver| Ok(resolver.discover()?))?;
            let candidates: Vec<AxisIdentity> = axes
                .into_iter()
                .filter(|a| !real_only || !a.is_virtual)
                .collect();
            commons::pick_axis(&candidates)
        }
    }
}
