// src/cli/handlers/show.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

use crate::{models::CommandSpec, state::AppContext};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Shows one catalog command in detail.")]
struct ShowArgs {
    /// Command name; `Cfg.` may be omitted and case is ignored.
    name: String,

    /// Look the command up in the controller-tuning catalog.
    #[arg(long)]
    controller: bool,
}

/// Prints the full entry of one command.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let show_args = ShowArgs::try_parse_from(&args)?;
    let file = context.load_catalog(show_args.controller)?;
    let spec = file
        .commands
        .find(&show_args.name)
        .ok_or_else(|| anyhow!(t!("show.error.not_found"), name = show_args.name))?;

    print_spec(spec, context.is_blocked(&spec.name)?);
    Ok(())
}

fn print_spec(spec: &CommandSpec, blocked: bool) {
    println!("\n{}", spec.template.cyan().bold());
    if !spec.description.is_empty() {
        println!("  {}", spec.description);
    }
    println!();
    print_field(t!("show.label.category"), &spec.category);
    print_field(t!("show.label.runtime"), spec.runtime_class.note());
    print_field(t!("show.label.source"), &spec.source_ref);
    print_field(t!("show.label.header"), &spec.header_source);
    print_field(t!("show.label.example"), &spec.header_example);
    if blocked {
        println!("  {}", t!("show.info.blocked").red().bold());
    }

    if spec.parameters.is_empty() {
        return;
    }
    println!("\n  {}", t!("show.label.parameters").yellow());
    for param in &spec.parameters {
        let mut line = format!("    {:<2} {}", param.order, param.name.cyan());
        if let Some(hint) = &param.hint {
            line.push_str(&format!(" <{}>", hint).dimmed().to_string());
        }
        if param.optional {
            line.push_str(&format!(" {}", t!("show.label.optional").dimmed()));
        }
        if let Some(default) = &param.default {
            line.push_str(&format!(" = {}", default));
        }
        println!("{}", line);
        if !param.description.is_empty() {
            println!("         {}", param.description.dimmed());
        }
    }
}

fn print_field(label: &str, value: &str) {
    if !value.is_empty() {
        println!("  {:<10} {}", label.dimmed(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{catalog_io, settings::Settings},
        models::{Catalog, CatalogFile, CommandParameter},
    };
    use tempfile::tempdir;

    #[test]
    fn test_show_finds_without_cfg_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ecmc_commands.json");
        let spec = CommandSpec::new(
            "Cfg.SetAxisEnable",
            vec![CommandParameter::named("axisId", 0), CommandParameter::named("enable", 1)],
        );
        catalog_io::save_catalog(&path, &CatalogFile::new(Catalog::from_commands(vec![spec])))
            .unwrap();
        let context = AppContext::new(Settings {
            catalog: Some(path.display().to_string()),
            blocklist: Some(dir.path().join("none.json").display().to_string()),
            ..Default::default()
        });

        handle(vec!["setaxisenable".into()], &context).unwrap();
        let err = handle(vec!["Nope".into()], &context).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }
}
