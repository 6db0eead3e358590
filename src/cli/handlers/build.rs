// src/cli/handlers/build.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;

use crate::{
    cli::handlers::{commons, filter},
    core::{
        catalog_builder, catalog_io,
        scanner::ScanOptions,
        sources::{self, SourceFile},
    },
    state::AppContext,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Builds the command catalog from the parser source and its headers."
)]
struct BuildArgs {
    /// Parser source file, e.g. `ecmcCmdParser.c`.
    #[arg(long, short = 's')]
    source: PathBuf,

    /// Directory searched recursively for documented `*.h` headers.
    #[arg(long = "headers")]
    headers: Option<PathBuf>,

    /// Output file. Defaults to the configured catalog path.
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,

    /// Call whose string arguments are command signatures. Repeatable.
    #[arg(long = "matcher", value_name = "CALL")]
    matchers: Vec<String>,

    /// Function whose commands are configuration commands. Repeatable.
    #[arg(long = "config-fn", value_name = "FUNCTION")]
    config_functions: Vec<String>,

    /// Also write the controller-tuning catalog next to the configured one.
    #[arg(long)]
    controller: bool,
}

/// Builds the catalog from the parser source and header docs.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let build_args = BuildArgs::try_parse_from(&args)?;

    let mut options = ScanOptions::default();
    if !build_args.matchers.is_empty() {
        options.matcher_calls = build_args.matchers;
    }
    if !build_args.config_functions.is_empty() {
        options.config_scope_functions = build_args.config_functions;
    }

    let display_root = std::env::current_dir().unwrap_or_default();
    let parser = SourceFile::read(&build_args.source, &display_root)?;
    let (headers, headers_root) = match &build_args.headers {
        Some(dir) => (
            sources::collect_headers(dir, &display_root)?,
            sources::display_path(dir, &display_root),
        ),
        None => (Vec::new(), String::new()),
    };

    println!(
        "{}",
        format!(
            t!("build.info.scanning"),
            source = parser.path.cyan(),
            count = headers.len()
        )
    );

    let build = catalog_builder::build_catalog(&parser, &headers, &options);
    commons::print_warnings(&build.warnings);
    let file = build.into_file(&headers_root);

    let out = match build_args.out {
        Some(path) => path,
        None => context.settings().catalog_path()?,
    };
    catalog_io::save_catalog(&out, &file)
        .with_context(|| format!(t!("build.error.write_failed"), path = out.display()))?;

    println!(
        "\n{}",
        format!(
            t!("build.success.written"),
            count = file.command_count,
            path = out.display()
        )
        .green()
    );

    if build_args.controller {
        let controller_out = context.settings().controller_catalog_path()?;
        filter::write_controller_catalog(&out, &file, &controller_out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::settings::Settings, models::CatalogFile};
    use std::fs;
    use tempfile::tempdir;

    const PARSER: &str = r#"
int handleCfgCommand(const char *myarg_1) {
  if (sscanf(myarg_1, "SetAxisEnable(%d,%d)", &a, &b) == 2) {}
  if (sscanf(myarg_1, "SetAxisCntrlKp(%d,%lf)", &a, &d) == 2) {}
  return 0;
}
int motorHandleOneArg(const char *myarg_1) {
  if (0 == strcmp(myarg_1, "GetControllerError()")) {}
  return 0;
}
"#;

    #[test]
    fn test_build_writes_both_catalogs() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("ecmcCmdParser.c");
        fs::write(&source, PARSER).unwrap();
        let settings = Settings {
            catalog: Some(dir.path().join("ecmc_commands.json").display().to_string()),
            controller_catalog: Some(dir.path().join("cntrl.json").display().to_string()),
            ..Default::default()
        };
        let context = AppContext::new(settings);

        handle(
            vec!["--source".into(), source.display().to_string(), "--controller".into()],
            &context,
        )
        .unwrap();

        let base: CatalogFile = context.load_catalog(false).unwrap();
        let names: Vec<&str> = base.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Cfg.SetAxisCntrlKp", "Cfg.SetAxisEnable", "GetControllerError"]
        );

        let controller = context.load_catalog(true).unwrap();
        assert_eq!(controller.command_count, 1);
        assert_eq!(controller.generated_for.as_deref(), Some("controller_tuning"));
        assert!(controller.source_hash.is_some());
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        let context = AppContext::new(Settings::default());
        let missing = dir.path().join("nope.c").display().to_string();
        assert!(handle(vec!["--source".into(), missing], &context).is_err());
    }
}
