// src/core/axis_resolver.rs

//! # Axis Resolver
//!
//! Maps an axis id or motor name to an [`AxisIdentity`] by walking the
//! controller's axis configuration chain:
//!
//! ```text
//! <prefix>:MCU-Cfg-AX-FrstObjId -> id
//! <prefix>:MCU-Cfg-AX<id>-Pfx / -Nam   (identity)
//! <prefix>:MCU-Cfg-AX<id>-NxtObjId -> next id, empty or -1 ends the chain
//! ```
//!
//! The walk is bounded by a step limit and a visited set, so a cyclic or
//! corrupt chain ends in [`ResolveError::AxisNotFound`] instead of hanging.

use crate::{
    constants::{MAX_AXIS_CHAIN_STEPS, REAL_AXIS_TYPE},
    core::pv::{self, PvClient, PvError, names},
    models::AxisIdentity,
};
use log::{debug, trace, warn};
use std::{collections::HashSet, fmt, time::Duration};
use thiserror::Error;

/// Why an axis could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The resolver was given no IOC prefix.
    #[error("IOC prefix is empty")]
    EmptyPrefix,
    /// The chain ended without a match.
    #[error("Axis {selector} not found under '{prefix}' ({steps} chain step(s) walked)")]
    AxisNotFound {
        selector: String,
        prefix: String,
        steps: usize,
    },
    /// A real axis was required but the match is virtual.
    #[error("Axis {axis_id} ({motor_prefix}) is virtual; a real axis is required")]
    AxisVirtualRejected { axis_id: u32, motor_prefix: String },
    /// A chain pointer could not be read.
    #[error(transparent)]
    Transport(#[from] PvError),
}

/// What to look for. When both an id and a motor name are given, the id wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisSelector {
    /// Numeric axis id.
    pub id: Option<u32>,
    /// Motor name (`M1`) or full motor record (`IOC:M1`).
    pub motor: Option<String>,
}

impl AxisSelector {
    /// Selects by axis id.
    pub fn by_id(id: u32) -> Self {
        Self {
            id: Some(id),
            motor: None,
        }
    }

    /// Selects by motor name or record.
    pub fn by_motor(motor: impl Into<String>) -> Self {
        Self {
            id: None,
            motor: Some(motor.into()),
        }
    }

    /// Parses user input: digits select an id, anything else a motor name.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        match input.parse::<u32>() {
            Ok(id) => Some(Self::by_id(id)),
            Err(_) => Some(Self::by_motor(input)),
        }
    }

    fn matches(&self, axis_id: u32, motor_name: &str, motor_record: &str) -> bool {
        if let Some(id) = self.id {
            return id == axis_id;
        }
        let Some(wanted) = self.motor.as_deref().map(str::trim).filter(|m| !m.is_empty()) else {
            return false;
        };
        let last_segment = motor_record.rsplit(':').next().unwrap_or(motor_record);
        [motor_name, motor_record, last_segment]
            .iter()
            .any(|candidate| !candidate.is_empty() && candidate.eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for AxisSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.id, self.motor.as_deref()) {
            (Some(id), _) => write!(f, "id {}", id),
            (None, Some(motor)) => write!(f, "'{}'", motor),
            (None, None) => write!(f, "<none>"),
        }
    }
}

/// Result of the startup probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The axis prefix PV answered with this value; full resolution may proceed.
    Ready(String),
    /// The caller should ask the operator to pick an axis.
    PromptSelection(String),
}

/// Walks the axis chain of one IOC.
#[derive(Debug)]
pub struct AxisResolver<'a> {
    client: &'a dyn PvClient,
    prefix: String,
    timeout: Duration,
    max_steps: usize,
}

impl<'a> AxisResolver<'a> {
    /// A resolver reading through `client` with a per-read `timeout`.
    pub fn new(client: &'a dyn PvClient, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            prefix: prefix.into().trim().to_string(),
            timeout,
            max_steps: MAX_AXIS_CHAIN_STEPS,
        }
    }

    /// Overrides the chain step limit.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Walks the chain until an axis matches `selector`.
    pub fn resolve(&self, selector: &AxisSelector) -> Result<AxisIdentity, ResolveError> {
        let (found, steps) = self.walk(|this, axis_id| {
            if selector.id.is_some_and(|id| id != axis_id) {
                return Ok(None);
            }
            let key = axis_id.to_string();
            let axis_prefix = this.read_lenient(&names::axis_prefix(&this.prefix, &key));
            let motor_name = this.read_lenient(&names::axis_name(&this.prefix, &key));
            let motor_record = pv::combine_motor_record(&axis_prefix, &motor_name);
            if selector.matches(axis_id, &motor_name, &motor_record) {
                Ok(Some(this.identity(axis_id, axis_prefix, motor_name, motor_record)))
            } else {
                Ok(None)
            }
        })?;

        match found {
            Some(identity) => {
                debug!("Resolved {} to {}", selector, identity);
                Ok(identity)
            }
            None => Err(ResolveError::AxisNotFound {
                selector: selector.to_string(),
                prefix: self.prefix.clone(),
                steps,
            }),
        }
    }

    /// Resolves and rejects virtual axes, for contexts that act on hardware.
    pub fn resolve_real(&self, selector: &AxisSelector) -> Result<AxisIdentity, ResolveError> {
        self.resolve(selector).and_then(require_real)
    }

    /// Enumerates every axis on the chain, in chain order.
    pub fn discover(&self) -> Result<Vec<AxisIdentity>, ResolveError> {
        let mut axes = Vec::new();
        self.walk(|this, axis_id| {
            let key = axis_id.to_string();
            let axis_prefix = this.read_lenient(&names::axis_prefix(&this.prefix, &key));
            let motor_name = this.read_lenient(&names::axis_name(&this.prefix, &key));
            let motor_record = pv::combine_motor_record(&axis_prefix, &motor_name);
            axes.push(this.identity(axis_id, axis_prefix, motor_name, motor_record));
            Ok(None::<()>)
        })?;
        debug!("Discovered {} axis/axes under '{}'", axes.len(), self.prefix);
        Ok(axes)
    }

    /// Single cheap read of the axis prefix PV, used before a full resolution.
    pub fn probe(&self, axis_id: u32) -> ProbeOutcome {
        if self.prefix.is_empty() {
            return ProbeOutcome::PromptSelection("IOC prefix unavailable".into());
        }
        let pv_name = names::axis_prefix(&self.prefix, &axis_id.to_string());
        match self.client.get(&pv_name, self.timeout) {
            Ok(raw) => {
                let value = pv::clean_value(&raw);
                if value.is_empty() {
                    ProbeOutcome::PromptSelection(format!("axis {} probe returned empty", axis_id))
                } else {
                    ProbeOutcome::Ready(value)
                }
            }
            Err(e) => ProbeOutcome::PromptSelection(e.to_string()),
        }
    }

    /// Follows the chain, calling `step` for every axis id until it yields a value.
    /// Returns that value (if any) and the number of axes visited.
    fn walk<T>(
        &self,
        mut step: impl FnMut(&Self, u32) -> Result<Option<T>, ResolveError>,
    ) -> Result<(Option<T>, usize), ResolveError> {
        if self.prefix.is_empty() {
            return Err(ResolveError::EmptyPrefix);
        }
        let mut current = self.read(&names::first_axis(&self.prefix))?;
        let mut seen = HashSet::new();
        let mut steps = 0usize;

        while !current.is_empty() && current != "-1" {
            if steps >= self.max_steps {
                warn!("Axis chain under '{}' exceeded {} steps", self.prefix, self.max_steps);
                break;
            }
            if !seen.insert(current.clone()) {
                warn!("Axis chain under '{}' loops back to id {}", self.prefix, current);
                break;
            }
            let Ok(axis_id) = current.parse::<u32>() else {
                warn!("Axis chain under '{}' holds non-numeric id '{}'", self.prefix, current);
                break;
            };
            steps += 1;
            trace!("Visiting axis {} (step {})", axis_id, steps);

            if let Some(found) = step(self, axis_id)? {
                return Ok((Some(found), steps));
            }
            current = self.read(&names::next_axis(&self.prefix, &current))?;
        }
        Ok((None, steps))
    }

    fn identity(
        &self,
        axis_id: u32,
        axis_prefix: String,
        motor_name: String,
        motor_record: String,
    ) -> AxisIdentity {
        let axis_type = if motor_record.is_empty() {
            String::new()
        } else {
            self.read_lenient(&names::axis_type(&motor_record))
        };
        AxisIdentity {
            axis_id,
            prefix: axis_prefix,
            motor_prefix: motor_record,
            motor_name,
            is_virtual: !axis_type.eq_ignore_ascii_case(REAL_AXIS_TYPE),
        }
    }

    fn read(&self, pv_name: &str) -> Result<String, PvError> {
        let value = pv::clean_value(&self.client.get(pv_name, self.timeout)?);
        debug!("get {} -> '{}'", pv_name, value);
        Ok(value)
    }

    /// Identity fields are optional on older controllers; a failed read counts as empty.
    fn read_lenient(&self, pv_name: &str) -> String {
        self.read(pv_name).unwrap_or_else(|e| {
            debug!("Ignoring failed read of '{}': {}", pv_name, e);
            String::new()
        })
    }
}

/// Rejects virtual axes. Callers fall back to offering a selection list.
pub fn require_real(identity: AxisIdentity) -> Result<AxisIdentity, ResolveError> {
    if identity.is_virtual {
        Err(ResolveError::AxisVirtualRejected {
            axis_id: identity.axis_id,
            motor_prefix: identity.motor_prefix,
        })
    } else {
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pv::testing::MemoryPv;

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Two axes: 1 is IOC:M1 (REAL), 2 is IOC:M2 (virtual).
    fn two_axis_chain() -> MemoryPv {
        MemoryPv::new()
            .with("IOC:MCU-Cfg-AX-FrstObjId", "1")
            .with("IOC:MCU-Cfg-AX1-Pfx", "IOC")
            .with("IOC:MCU-Cfg-AX1-Nam", "M1")
            .with("IOC:MCU-Cfg-AX1-NxtObjId", "2")
            .with("IOC:M1-Type", "REAL")
            .with("IOC:MCU-Cfg-AX2-Pfx", "\"IOC\"")
            .with("IOC:MCU-Cfg-AX2-Nam", "M2")
            .with("IOC:MCU-Cfg-AX2-NxtObjId", "-1")
            .with("IOC:M2-Type", "VIRTUAL")
    }

    #[test]
    fn test_resolve_by_id_and_by_motor() {
        let client = two_axis_chain();
        let resolver = AxisResolver::new(&client, "IOC", TIMEOUT);

        let axis = resolver.resolve(&AxisSelector::by_id(1)).unwrap();
        assert_eq!(axis.motor_prefix, "IOC:M1");
        assert!(!axis.is_virtual);

        for name in ["m2", "IOC:M2", "ioc:m2"] {
            let axis = resolver.resolve(&AxisSelector::by_motor(name)).unwrap();
            assert_eq!(axis.axis_id, 2);
            assert!(axis.is_virtual);
        }
    }

    #[test]
    fn test_virtual_axis_rejected_in_real_only_context() {
        let client = two_axis_chain();
        let resolver = AxisResolver::new(&client, "IOC", TIMEOUT);
        let result = resolver.resolve_real(&AxisSelector::by_id(2));
        assert_eq!(
            result,
            Err(ResolveError::AxisVirtualRejected {
                axis_id: 2,
                motor_prefix: "IOC:M2".into()
            })
        );
    }

    #[test]
    fn test_missing_axis_terminates_within_chain_length() {
        let client = two_axis_chain();
        let resolver = AxisResolver::new(&client, "IOC:", TIMEOUT);
        let result = resolver.resolve(&AxisSelector::by_id(7));
        assert!(matches!(result, Err(ResolveError::AxisNotFound { steps: 2, .. })));
        let pointer_reads = client
            .reads()
            .iter()
            .filter(|pv| pv.ends_with("ObjId"))
            .count();
        assert_eq!(pointer_reads, 3);
    }

    #[test]
    fn test_cycle_and_step_limit_end_the_walk() {
        let client = two_axis_chain();
        client.set("IOC:MCU-Cfg-AX2-NxtObjId", "1");
        let resolver = AxisResolver::new(&client, "IOC", TIMEOUT);
        assert!(matches!(
            resolver.resolve(&AxisSelector::by_motor("nope")),
            Err(ResolveError::AxisNotFound { steps: 2, .. })
        ));

        let limited = AxisResolver::new(&client, "IOC", TIMEOUT).with_max_steps(1);
        assert!(matches!(
            limited.resolve(&AxisSelector::by_id(2)),
            Err(ResolveError::AxisNotFound { steps: 1, .. })
        ));
    }

    #[test]
    fn test_id_takes_precedence_over_motor() {
        let client = two_axis_chain();
        let resolver = AxisResolver::new(&client, "IOC", TIMEOUT);
        let selector = AxisSelector {
            id: Some(2),
            motor: Some("M1".into()),
        };
        assert_eq!(resolver.resolve(&selector).unwrap().axis_id, 2);
    }

    #[test]
    fn test_discover_lists_chain_in_order() {
        let client = two_axis_chain();
        let axes = AxisResolver::new(&client, "IOC", TIMEOUT).discover().unwrap();
        let records: Vec<&str> = axes.iter().map(|a| a.motor_prefix.as_str()).collect();
        assert_eq!(records, vec!["IOC:M1", "IOC:M2"]);
    }

    #[test]
    fn test_empty_prefix_and_transport_errors() {
        let client = two_axis_chain();
        assert_eq!(
            AxisResolver::new(&client, " ", TIMEOUT).resolve(&AxisSelector::by_id(1)),
            Err(ResolveError::EmptyPrefix)
        );
        client.block("IOC:MCU-Cfg-AX-FrstObjId");
        assert!(matches!(
            AxisResolver::new(&client, "IOC", TIMEOUT).discover(),
            Err(ResolveError::Transport(_))
        ));
    }

    #[test]
    fn test_probe_outcomes() {
        let client = two_axis_chain();
        client.set("IOC:MCU-Cfg-AX3-Pfx", "  ");
        let resolver = AxisResolver::new(&client, "IOC", TIMEOUT);
        assert_eq!(resolver.probe(1), ProbeOutcome::Ready("IOC".into()));
        assert!(matches!(resolver.probe(3), ProbeOutcome::PromptSelection(_)));
        assert!(matches!(resolver.probe(9), ProbeOutcome::PromptSelection(_)));
        assert!(matches!(
            AxisResolver::new(&client, "", TIMEOUT).probe(1),
            ProbeOutcome::PromptSelection(_)
        ));
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(AxisSelector::parse(" 3 "), Some(AxisSelector::by_id(3)));
        assert_eq!(AxisSelector::parse("M1"), Some(AxisSelector::by_motor("M1")));
        assert_eq!(AxisSelector::parse(""), None);
    }
}
