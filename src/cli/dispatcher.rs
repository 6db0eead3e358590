use anyhow::{Result, anyhow};
use colored::Colorize;

use crate::{cli::handlers, state::AppContext};

/// Defines an action, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &AppContext) -> Result<()>,
}

/// The single source of truth for all actions.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "axes",
        aliases: &["discover"],
        handler: handlers::axes::handle,
    },
    CommandDefinition {
        name: "build",
        aliases: &[],
        handler: handlers::build::handle,
    },
    CommandDefinition {
        name: "exec",
        aliases: &["x", "run"],
        handler: handlers::exec::handle,
    },
    CommandDefinition {
        name: "fav",
        aliases: &["favorites"],
        handler: handlers::fav::handle,
    },
    CommandDefinition {
        name: "filter",
        aliases: &[],
        handler: handlers::filter::handle,
    },
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        handler: handlers::list::handle,
    },
    CommandDefinition {
        name: "probe",
        aliases: &[],
        handler: handlers::probe::handle,
    },
    CommandDefinition {
        name: "resolve",
        aliases: &[],
        handler: handlers::resolve::handle,
    },
    CommandDefinition {
        name: "show",
        aliases: &["info"],
        handler: handlers::show::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `ecmc-cmd <action> [args...]` to the action's handler.
pub fn dispatch(all_args: Vec<String>, context: &AppContext) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let mut args = all_args.into_iter();
    let Some(action) = args.next() else {
        println!("{}", t!("dispatcher.info.welcome").cyan());
        return Ok(());
    };

    let command = find_command(&action)
        .ok_or_else(|| anyhow!(t!("dispatcher.error.unknown_action"), action = action))?;
    (command.handler)(args.collect(), context)
}
