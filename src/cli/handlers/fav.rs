//! # Handler for the `fav` command
//!
//! Saved command invocations. Argument templates may contain `<name>`
//! placeholders that are filled from the values given to `fav run`, in order.
//! Entries are numbered from 1 on the command line.

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;

use crate::{
    cli::handlers::exec::{self, ExecOptions},
    core::favorites::FavoritesStore,
    models::Favorite,
    state::AppContext,
};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manage saved command invocations.")]
struct FavArgs {
    #[command(subcommand)]
    command: Option<FavCommand>,
}

#[derive(Subcommand, Debug)]
enum FavCommand {
    /// Lists saved favorites.
    #[command(name = "list", aliases = ["ls"])]
    List,
    /// Saves a command with an argument template, e.g. `Cfg.SetAxisEnable <axis> 1`.
    Add {
        command: String,
        #[arg(allow_negative_numbers = true)]
        template: Vec<String>,
    },
    /// Removes the favorite with the given number.
    #[command(name = "remove", aliases = ["rm"])]
    Remove { number: usize },
    /// Runs the favorite with the given number, filling its placeholders.
    Run {
        number: usize,
        #[arg(allow_negative_numbers = true)]
        values: Vec<String>,
        #[arg(long, short = 'y')]
        yes: bool,
        #[arg(long, short = 'a')]
        axis: Option<String>,
    },
}

/// Entry point for `fav`. Without a subcommand the favorites are listed.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let fav_args = FavArgs::try_parse_from(&args)?;
    let mut store = context.favorites()?;

    match fav_args.command.unwrap_or(FavCommand::List) {
        FavCommand::List => handle_list(&store),
        FavCommand::Add { command, template } => handle_add(context, &mut store, command, template),
        FavCommand::Remove { number } => handle_remove(&mut store, number),
        FavCommand::Run {
            number,
            values,
            yes,
            axis,
        } => {
            let favorite = lookup(&store, number)?.clone();
            let args = favorite.fill(&values).ok_or_else(|| {
                anyhow!(
                    t!("fav.error.missing_values"),
                    placeholders = favorite.placeholders().join(", ")
                )
            })?;
            let options = ExecOptions {
                yes,
                axis,
                ..Default::default()
            };
            exec::execute(context, &favorite.command_name, args, &options)
        }
    }
}

fn handle_list(store: &FavoritesStore) -> Result<()> {
    if store.list().is_empty() {
        println!("{}", t!("fav.info.empty").yellow());
        return Ok(());
    }
    for (i, favorite) in store.list().iter().enumerate() {
        println!(
            "{:>3}  {} {}",
            (i + 1).to_string().cyan(),
            favorite.command_name.bold(),
            favorite.argument_template.join(" ")
        );
    }
    Ok(())
}

fn handle_add(
    context: &AppContext,
    store: &mut FavoritesStore,
    command: String,
    template: Vec<String>,
) -> Result<()> {
    let catalog = context.load_catalog(false)?;
    let name = match catalog.commands.find(&command) {
        Some(spec) => spec.name.clone(),
        None => return Err(anyhow!(t!("show.error.not_found"), name = command)),
    };
    let favorite = Favorite {
        command_name: name.clone(),
        argument_template: template,
    };
    if store.add(favorite)? {
        println!(
            "{}",
            format!(t!("fav.success.added"), name = name.cyan()).green()
        );
    } else {
        println!("{}", format!(t!("fav.info.duplicate"), name = name).yellow());
    }
    Ok(())
}

fn handle_remove(store: &mut FavoritesStore, number: usize) -> Result<()> {
    let index = number
        .checked_sub(1)
        .ok_or_else(|| anyhow!(t!("fav.error.bad_number"), number = number))?;
    match store.remove(index)? {
        Some(removed) => {
            println!(
                "{}",
                format!(t!("fav.success.removed"), name = removed.command_name).green()
            );
            Ok(())
        }
        None => Err(anyhow!(t!("fav.error.bad_number"), number = number)),
    }
}

fn lookup(store: &FavoritesStore, number: usize) -> Result<&Favorite> {
    number
        .checked_sub(1)
        .and_then(|i| store.get(i))
        .ok_or_else(|| anyhow!(t!("fav.error.bad_number"), number = number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{catalog_io, pv::testing::MemoryPv, settings::Settings},
        models::{Catalog, CatalogFile, CommandParameter, CommandSpec},
    };
    use std::{path::Path, sync::Arc};
    use tempfile::tempdir;

    fn context(dir: &Path, memory: Arc<MemoryPv>) -> AppContext {
        let catalog = dir.join("ecmc_commands.json");
        let spec = CommandSpec::new(
            "MoveVelocity",
            vec![CommandParameter::named("axisId", 0), CommandParameter::named("velocity", 1)],
        );
        catalog_io::save_catalog(&catalog, &CatalogFile::new(Catalog::from_commands(vec![spec])))
            .unwrap();
        let settings = Settings {
            prefix: Some("IOC".into()),
            timeout: Some(0.5),
            catalog: Some(catalog.display().to_string()),
            favorites: Some(dir.join("favorites.json").display().to_string()),
            blocklist: Some(dir.join("none.json").display().to_string()),
            ..Default::default()
        };
        AppContext::with_client(settings, memory)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_run_remove() {
        let dir = tempdir().unwrap();
        let memory = Arc::new(MemoryPv::new().with("IOC:MCU-Cmd.AINP", "OK"));
        let context = context(dir.path(), memory.clone());

        handle(args(&["add", "movevelocity", "<axis>", "-2.50"]), &context).unwrap();
        assert_eq!(context.favorites().unwrap().list().len(), 1);
        assert_eq!(context.favorites().unwrap().list()[0].command_name, "MoveVelocity");

        assert!(handle(args(&["run", "1"]), &context).is_err());
        handle(args(&["run", "1", "3"]), &context).unwrap();
        assert!(memory
            .writes()
            .contains(&("IOC:MCU-Cmd.AOUT".to_string(), "MoveVelocity(3,-2.5)".to_string())));

        handle(args(&["rm", "1"]), &context).unwrap();
        assert!(context.favorites().unwrap().list().is_empty());
        assert!(handle(args(&["remove", "1"]), &context).is_err());
        assert!(handle(args(&["remove", "0"]), &context).is_err());
    }

    #[test]
    fn test_add_unknown_command_fails() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), Arc::new(MemoryPv::new()));
        assert!(handle(args(&["add", "Nope"]), &context).is_err());
        assert!(handle(Vec::new(), &context).is_ok());
    }
}
