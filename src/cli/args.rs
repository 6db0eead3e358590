// src/cli/args.rs
use crate::core::settings::Settings;
use clap::Args;
use std::path::PathBuf;

/// Flags accepted before the action. Every value overrides `config.toml`.
#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Settings file to use instead of the default `config.toml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// IOC prefix, e.g. `IOC_TEST`.
    #[arg(long, short = 'p')]
    pub prefix: Option<String>,

    /// Command PV (default `<prefix>:MCU-Cmd.AOUT`).
    #[arg(long)]
    pub cmd_pv: Option<String>,

    /// Readback PV (default `<prefix>:MCU-Cmd.AINP`). Pass "" for write-only.
    #[arg(long)]
    pub qry_pv: Option<String>,

    /// Default axis id.
    #[arg(long, short = 'a')]
    pub axis_id: Option<u32>,

    /// Timeout in seconds for PV access and dispatch.
    #[arg(long, short = 't')]
    pub timeout: Option<f64>,

    /// Command catalog JSON.
    #[arg(long)]
    pub catalog: Option<String>,

    /// Favorites JSON.
    #[arg(long)]
    pub favorites: Option<String>,

    /// Blocklist JSON.
    #[arg(long)]
    pub blocklist: Option<String>,
}

impl GlobalArgs {
    /// The flags as a settings layer to merge over the file.
    pub fn to_overrides(&self) -> Settings {
        Settings {
            prefix: self.prefix.clone(),
            cmd_pv: self.cmd_pv.clone(),
            qry_pv: self.qry_pv.clone(),
            axis_id: self.axis_id,
            timeout: self.timeout,
            catalog: self.catalog.clone(),
            favorites: self.favorites.clone(),
            blocklist: self.blocklist.clone(),
            ..Default::default()
        }
    }
}
