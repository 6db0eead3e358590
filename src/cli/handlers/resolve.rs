// src/cli/handlers/resolve.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

use crate::{
    cli::handlers::commons,
    core::axis_resolver::{AxisSelector, ResolveError},
    models::AxisIdentity,
    state::AppContext,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Resolves an axis id or motor name to its controller axis."
)]
struct ResolveArgs {
    /// Axis id or motor name. Defaults to the configured axis id.
    selector: Option<String>,

    /// Reject virtual axes.
    #[arg(long)]
    real_only: bool,

    /// Fail on a rejected virtual axis instead of offering the axis picker.
    #[arg(long)]
    no_prompt: bool,
}

/// Resolves one axis and prints its identity.
pub fn handle(args: Vec<String>, context: &AppContext) -> Result<()> {
    let resolve_args = ResolveArgs::try_parse_from(&args)?;
    let selector = selector_or_default(resolve_args.selector.as_deref(), context)?;
    let axis = resolve_or_pick(
        context,
        &selector,
        resolve_args.real_only,
        !resolve_args.no_prompt,
    )?;

    println!("{}", commons::format_axis(&axis));
    println!(
        "  {} {}",
        t!("resolve.label.motor").dimmed(),
        axis.motor_name
    );
    println!(
        "  {} {}",
        t!("resolve.label.prefix").dimmed(),
        axis.prefix
    );
    Ok(())
}

/// Parses `input`, falling back to the configured axis id.
pub fn selector_or_default(input: Option<&str>, context: &AppContext) -> Result<AxisSelector> {
    match input.and_then(AxisSelector::parse) {
        Some(selector) => Ok(selector),
        None => context
            .settings()
            .axis_id
            .map(AxisSelector::by_id)
            .ok_or_else(|| anyhow!(t!("resolve.error.no_selector"))),
    }
}

/// Resolves `selector`, optionally rejecting virtual axes.
pub fn resolve(context: &AppContext, selector: &AxisSelector, real_only: bool) -> Result<AxisIdentity> {
    commons::with_resolver(context, |resolver| {
        let axis = if real_only {
            resolver.resolve_real(selector)?
        } else {
            resolver.resolve(selector)?
        };
        Ok(axis)
    })
}

/// Like [`resolve`], but a virtual axis rejected in a real-only context
/// falls back to the axis picker over the real axes of the chain.
pub fn resolve_or_pick(
    context: &AppContext,
    selector: &AxisSelector,
    real_only: bool,
    allow_prompt: bool,
) -> Result<AxisIdentity> {
    if allow_prompt {
        resolve_with_fallback(context, selector, real_only, commons::pick_axis)
    } else {
        resolve(context, selector, real_only)
    }
}

fn resolve_with_fallback(
    context: &AppContext,
    selector: &AxisSelector,
    real_only: bool,
    pick: impl FnOnce(&[AxisIdentity]) -> Result<Option<AxisIdentity>>,
) -> Result<AxisIdentity> {
    let err = match resolve(context, selector, real_only) {
        Ok(axis) => return Ok(axis),
        Err(err) => err,
    };
    let rejected = match err.downcast_ref::<ResolveError>() {
        Some(ResolveError::AxisVirtualRejected { axis_id, .. }) => Some(*axis_id),
        _ => None,
    };
    let Some(axis_id) = rejected else {
        return Err(err);
    };
    eprintln!(
        "{}",
        format!(t!("resolve.warning.virtual_rejected"), id = axis_id).yellow()
    );

    let axes = commons::with_resolver(context, |resolver| Ok(resolver.discover()?))?;
    let candidates: Vec<AxisIdentity> = axes.into_iter().filter(|a| !a.is_virtual).collect();
    match pick(&candidates)? {
        Some(axis) => Ok(axis),
        None => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{pv::testing::MemoryPv, settings::Settings};
    use std::sync::Arc;

    fn context(axis_id: Option<u32>) -> AppContext {
        let memory = MemoryPv::new()
            .with("IOC:MCU-Cfg-AX-FrstObjId", "1")
            .with("IOC:MCU-Cfg-AX1-Pfx", "IOC")
            .with("IOC:MCU-Cfg-AX1-Nam", "M1")
            .with("IOC:MCU-Cfg-AX1-NxtObjId", "2")
            .with("IOC:M1-Type", "REAL")
            .with("IOC:MCU-Cfg-AX2-Pfx", "IOC")
            .with("IOC:MCU-Cfg-AX2-Nam", "VM2")
            .with("IOC:MCU-Cfg-AX2-NxtObjId", "-1")
            .with("IOC:VM2-Type", "VIRT");
        let settings = Settings {
            prefix: Some("IOC".into()),
            axis_id,
            timeout: Some(0.1),
            ..Default::default()
        };
        AppContext::with_client(settings, Arc::new(memory))
    }

    #[test]
    fn test_resolve_by_motor_name() {
        let context = context(None);
        let selector = selector_or_default(Some("vm2"), &context).unwrap();
        let axis = resolve(&context, &selector, false).unwrap();
        assert_eq!(axis.axis_id, 2);
        assert!(axis.is_virtual);
    }

    #[test]
    fn test_real_only_rejects_virtual() {
        let context = context(Some(2));
        let selector = selector_or_default(None, &context).unwrap();
        let err = resolve(&context, &selector, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::AxisVirtualRejected { axis_id: 2, .. })
        ));
        assert!(handle(vec!["1".into(), "--real-only".into()], &context).is_ok());
        assert!(handle(vec!["2".into(), "--real-only".into(), "--no-prompt".into()], &context).is_err());
    }

    #[test]
    fn test_rejected_virtual_axis_offers_real_axes() {
        let context = context(None);
        let selector = selector_or_default(Some("2"), &context).unwrap();

        let mut offered = Vec::new();
        let axis = resolve_with_fallback(&context, &selector, true, |axes| {
            offered = axes.iter().map(|a| a.axis_id).collect();
            Ok(axes.first().cloned())
        })
        .unwrap();
        assert_eq!(offered, vec![1]);
        assert_eq!(axis.axis_id, 1);
        assert!(!axis.is_virtual);

        let aborted = resolve_with_fallback(&context, &selector, true, |_| Ok(None)).unwrap_err();
        assert!(matches!(
            aborted.downcast_ref::<ResolveError>(),
            Some(ResolveError::AxisVirtualRejected { axis_id: 2, .. })
        ));
    }

    #[test]
    fn test_other_errors_skip_the_picker() {
        let context = context(None);
        let selector = selector_or_default(Some("9"), &context).unwrap();
        let result = resolve_with_fallback(&context, &selector, true, |_| {
            Err(anyhow!("picker shown"))
        });
        assert!(matches!(
            result.unwrap_err().downcast_ref::<ResolveError>(),
            Some(ResolveError::AxisNotFound { .. })
        ));
    }

    #[test]
    fn test_no_selector_without_default() {
        let context = context(None);
        assert!(selector_or_default(Some("  "), &context).is_err());
    }
}
