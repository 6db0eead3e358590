// src/cli/handlers/axes.rs

use anyhow::Result;
use clap::Parser;
use colored::*;

use crate::{cli::handlers::commons, state::AppContext};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists the axes configured on the controller.")]
struct AxesArgs {
    /// Only list real axes.
    #[arg(long)]
    real_only: bool,
}

/// Lists the axes configured on the controller.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let axes_args = AxesArgs::try_parse_from(&args)?;
    let axes = commons::with_resolver(context, |resolver| Ok(resolver.discover()?))?;

    let shown: Vec<_> = axes
        .iter()
        .filter(|a| !axes_args.real_only || !a.is_virtual)
        .collect();
    if shown.is_empty() {
        println!(
            "{}",
            format!(t!("axes.info.none"), prefix = context.settings().prefix()).yellow()
        );
        return Ok(());
    }
    for axis in shown {
        println!("{}", commons::format_axis(axis));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{pv::testing::MemoryPv, settings::Settings};
    use std::sync::Arc;

    fn context(memory: Arc<MemoryPv>) -> AppContext {
        let settings = Settings {
            prefix: Some("IOC".into()),
            timeout: Some(0.1),
            ..Default::default()
        };
        AppContext::with_client(settings, memory)
    }

    #[test]
    fn test_axes_walks_chain() {
        let memory = Arc::new(
            MemoryPv::new()
                .with("IOC:MCU-Cfg-AX-FrstObjId", "1")
                .with("IOC:MCU-Cfg-AX1-Pfx", "IOC")
                .with("IOC:MCU-Cfg-AX1-Nam", "M1")
                .with("IOC:MCU-Cfg-AX1-NxtObjId", "-1")
                .with("IOC:M1-Type", "REAL"),
        );
        let context = context(memory.clone());
        handle(vec!["--real-only".into()], &context).unwrap();
        assert!(memory.reads().contains(&"IOC:M1-Type".to_string()));
    }

    #[test]
    fn test_missing_chain_head_is_an_error() {
        let context = context(Arc::new(MemoryPv::new()));
        assert!(handle(Vec::new(), &context).is_err());
    }
}
