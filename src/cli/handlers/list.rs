// src/cli/handlers/list.rs

use anyhow::Result;
use clap::Parser;
use colored::*;

use crate::{
    core::catalog_filter::NamePattern,
    models::{CommandSpec, command_key},
    state::AppContext,
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists catalog commands.")]
struct ListArgs {
    /// Wildcard over command names, e.g. `*Enable*`.
    pattern: Option<String>,

    /// Only commands of this category (case-insensitive).
    #[arg(long, short = 'c')]
    category: Option<String>,

    /// Read the controller-tuning catalog instead of the base catalog.
    #[arg(long)]
    controller: bool,

    /// Hide commands refused by the blocklist.
    #[arg(long)]
    hide_blocked: bool,

    /// Print the matching entries as JSON.
    #[arg(long)]
    json: bool,
}

/// Lists catalog commands grouped by category.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let list_args = ListArgs::try_parse_from(&args)?;
    let file = context.load_catalog(list_args.controller)?;

    let pattern = list_args.pattern.as_deref().map(NamePattern::new).transpose()?;
    let mut selected: Vec<&CommandSpec> = Vec::new();
    for spec in file.commands.iter() {
        if pattern.as_ref().is_some_and(|p| !p.matches(&spec.name)) {
            continue;
        }
        if list_args
            .category
            .as_deref()
            .is_some_and(|c| !spec.category.eq_ignore_ascii_case(c))
        {
            continue;
        }
        if list_args.hide_blocked && context.is_blocked(&spec.name)? {
            continue;
        }
        selected.push(spec);
    }

    if list_args.json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    if selected.is_empty() {
        println!("{}", t!("list.info.no_match").yellow());
        return Ok(());
    }

    let mut current_category: Option<&str> = None;
    let mut sorted = selected;
    sorted.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| command_key(&a.name).cmp(&command_key(&b.name)))
    });
    for spec in &sorted {
        if current_category != Some(spec.category.as_str()) {
            let heading = if spec.category.is_empty() {
                t!("list.info.uncategorized")
            } else {
                spec.category.as_str()
            };
            println!("\n{}", heading.green().bold());
            current_category = Some(spec.category.as_str());
        }
        let blocked = if context.is_blocked(&spec.name)? {
            format!(" {}", t!("list.info.blocked").red())
        } else {
            String::new()
        };
        println!("  {}{}", spec.template.cyan(), blocked);
        if !spec.description.is_empty() {
            println!("      {}", spec.description.dimmed());
        }
    }
    println!(
        "\n{}",
        format!(t!("list.info.total"), count = sorted.len()).dimmed()
    );
    Ok(())
}
