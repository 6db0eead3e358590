// src/cli/handlers/filter.rs

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use regex::RegexBuilder;
use std::path::{Path, PathBuf};

use crate::{
    core::{
        cache,
        catalog_filter::{self, CONTROLLER_TUNING, FilterPolicy},
        catalog_io,
    },
    models::CatalogFile,
    state::AppContext,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Derives a restricted catalog from the base catalog."
)]
struct FilterArgs {
    /// Base catalog. Defaults to the configured catalog.
    #[arg(long = "in", short = 'i')]
    input: Option<PathBuf>,

    /// Output file. Defaults to the controller catalog path with `--controller`.
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,

    /// Keep only controller-tuning commands.
    #[arg(long)]
    controller: bool,

    /// Wildcard of commands to keep. Repeatable.
    #[arg(long = "allow", value_name = "PATTERN")]
    allow: Vec<String>,

    /// Wildcard of commands to drop. Repeatable.
    #[arg(long = "deny", value_name = "PATTERN")]
    deny: Vec<String>,

    /// Regex over name, template, description and category. Repeatable.
    #[arg(long = "match", value_name = "REGEX")]
    matching: Vec<String>,

    /// Also drop everything on the configured blocklist.
    #[arg(long)]
    blocklist: bool,

    /// `generatedFor` label recorded in the output.
    #[arg(long = "for", value_name = "LABEL")]
    generated_for: Option<String>,

    /// Only report whether the output is stale with respect to the base.
    #[arg(long)]
    check: bool,
}

/// Writes a filtered catalog, or checks whether an existing one is stale.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let filter_args = FilterArgs::try_parse_from(&args)?;

    let input = match &filter_args.input {
        Some(path) => path.clone(),
        None => context.settings().catalog_path()?,
    };
    let out = match (&filter_args.out, filter_args.controller) {
        (Some(path), _) => path.clone(),
        (None, true) => context.settings().controller_catalog_path()?,
        (None, false) => return Err(anyhow!(t!("filter.error.out_required"))),
    };

    if filter_args.check {
        return report_staleness(&input, &out);
    }

    let policy = build_policy(&filter_args, context)?;
    let base = catalog_io::load_catalog(&input)?;
    let generated_for = filter_args
        .generated_for
        .as_deref()
        .or(filter_args.controller.then_some(CONTROLLER_TUNING));
    write_derived(&input, &base, &policy, generated_for, &out)
}

/// Derives and writes the controller-tuning catalog for `base`, read from `base_path`.
pub fn write_controller_catalog(base_path: &Path, base: &CatalogFile, out: &Path) -> Result<()> {
    write_derived(
        base_path,
        base,
        &FilterPolicy::controller_only(),
        Some(CONTROLLER_TUNING),
        out,
    )
}

fn write_derived(
    base_path: &Path,
    base: &CatalogFile,
    policy: &FilterPolicy,
    generated_for: Option<&str>,
    out: &Path,
) -> Result<()> {
    let source_hash = cache::file_hash(base_path)?;
    let derived = catalog_filter::derive(base, policy, generated_for, Some(source_hash));
    catalog_io::save_catalog(out, &derived)
        .with_context(|| format!(t!("filter.error.write_failed"), path = out.display()))?;

    println!(
        "{}",
        format!(
            t!("filter.success.written"),
            kept = derived.command_count,
            total = base.command_count,
            path = out.display()
        )
        .green()
    );
    Ok(())
}

fn build_policy(filter_args: &FilterArgs, context: &AppContext) -> Result<FilterPolicy> {
    let mut policies = Vec::new();
    if filter_args.controller {
        policies.push(FilterPolicy::controller_only());
    }
    if !filter_args.allow.is_empty() {
        policies.push(FilterPolicy::allow_list(filter_args.allow.as_slice())?);
    }
    if !filter_args.deny.is_empty() {
        policies.push(FilterPolicy::deny_list(filter_args.deny.as_slice())?);
    }
    if !filter_args.matching.is_empty() {
        let patterns = filter_args
            .matching
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        policies.push(FilterPolicy::Matching {
            labels: filter_args.matching.iter().map(|p| format!("~{}", p)).collect(),
            patterns,
        });
    }
    if filter_args.blocklist {
        policies.push(context.blocklist()?.clone());
    }
    Ok(FilterPolicy::All(policies))
}

fn report_staleness(input: &Path, out: &Path) -> Result<()> {
    let derived = catalog_io::load_catalog(out)?;
    if catalog_filter::is_stale(input, &derived)? {
        println!(
            "{}",
            format!(t!("filter.check.stale"), path = out.display()).yellow()
        );
    } else {
        println!(
            "{}",
            format!(t!("filter.check.fresh"), path = out.display()).green()
        );
    }
    Ok(())
}
