// src/core/pv.rs

//! Process-variable access: the transport trait used by the resolver and the
//! dispatcher, plus the naming helpers for controller PVs.

use crate::constants::{
    AXIS_CHAIN_FIRST_SUFFIX, COMMAND_PV_SUFFIX, PROC_FIELD, QUERY_PV_SUFFIX,
};
use std::time::Duration;
use thiserror::Error;

/// Failures of a single PV access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PvError {
    /// No value within the timeout.
    #[error("Timed out after {timeout:?} accessing '{pv}'")]
    Timeout { pv: String, timeout: Duration },
    /// The PV or its server is not reachable.
    #[error("'{pv}' is unavailable: {message}")]
    Unavailable { pv: String, message: String },
    /// The value could not be written or interpreted.
    #[error("Invalid value for '{pv}': {message}")]
    Invalid { pv: String, message: String },
}

/// Blocking access to named process variables. Each call is bounded by `timeout`.
pub trait PvClient: Send + Sync + std::fmt::Debug {
    /// Reads the value of `pv` as text.
    fn get(&self, pv: &str, timeout: Duration) -> Result<String, PvError>;
    /// Writes `value` to `pv`.
    fn put(&self, pv: &str, value: &str, timeout: Duration) -> Result<(), PvError>;
}

/// Joins an IOC prefix and a PV suffix with `:` unless the prefix already ends with one.
pub fn join_prefix(prefix: &str, suffix: &str) -> String {
    let prefix = prefix.trim();
    let suffix = suffix.trim();
    if prefix.is_empty() {
        suffix.to_string()
    } else if prefix.ends_with(':') {
        format!("{}{}", prefix, suffix)
    } else {
        format!("{}:{}", prefix, suffix)
    }
}

/// The `.PROC` field of the record behind `pv`. Empty input gives an empty name.
pub fn proc_pv_for(pv: &str) -> String {
    let pv = pv.trim();
    if pv.is_empty() {
        return String::new();
    }
    let record = pv.split_once('.').map_or(pv, |(record, _)| record);
    format!("{}.{}", record, PROC_FIELD)
}

/// Strips surrounding whitespace and quotes from a value read over the wire.
pub fn clean_value(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

/// Motor record base for an axis: `<pfx>:<name>`, or `name` alone when it
/// already names a full record.
pub fn combine_motor_record(axis_prefix: &str, motor_name: &str) -> String {
    let a = axis_prefix.trim();
    let m = motor_name.trim();
    if a.is_empty() || m.is_empty() {
        return if a.is_empty() { m } else { a }.to_string();
    }
    if m.starts_with(a) || m.contains(':') {
        return m.to_string();
    }
    join_prefix(a, m)
}

/// Well-known controller PV names under an IOC prefix.
pub mod names {
    use super::*;

    /// `<prefix>:MCU-Cfg-AX-FrstObjId`
    pub fn first_axis(prefix: &str) -> String {
        join_prefix(prefix, AXIS_CHAIN_FIRST_SUFFIX)
    }

    /// `<prefix>:MCU-Cfg-AX<id>-NxtObjId`
    pub fn next_axis(prefix: &str, axis_id: &str) -> String {
        join_prefix(prefix, &format!("MCU-Cfg-AX{}-NxtObjId", axis_id))
    }

    /// `<prefix>:MCU-Cfg-AX<id>-Pfx`
    pub fn axis_prefix(prefix: &str, axis_id: &str) -> String {
        join_prefix(prefix, &format!("MCU-Cfg-AX{}-Pfx", axis_id))
    }

    /// `<prefix>:MCU-Cfg-AX<id>-Nam`
    pub fn axis_name(prefix: &str, axis_id: &str) -> String {
        join_prefix(prefix, &format!("MCU-Cfg-AX{}-Nam", axis_id))
    }

    /// `<motor>-Type`
    pub fn axis_type(motor_record: &str) -> String {
        format!("{}-Type", motor_record.trim())
    }

    /// `<prefix>:MCU-Cmd.AOUT`
    pub fn command(prefix: &str) -> String {
        join_prefix(prefix, COMMAND_PV_SUFFIX)
    }

    /// `<prefix>:MCU-Cmd.AINP`
    pub fn query(prefix: &str) -> String {
        join_prefix(prefix, QUERY_PV_SUFFIX)
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory [`PvClient`] for tests.

    use super::*;
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
        thread,
    };

    #[derive(Debug, Default)]
    pub struct MemoryPv {
        values: Mutex<HashMap<String, String>>,
        writes: Mutex<Vec<(String, String)>>,
        reads: Mutex<Vec<String>>,
        delays: Mutex<HashMap<String, Duration>>,
        unavailable: Mutex<HashSet<String>>,
    }

    impl MemoryPv {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(self, pv: &str, value: &str) -> Self {
            self.set(pv, value);
            self
        }

        pub fn set(&self, pv: &str, value: &str) {
            self.values.lock().unwrap().insert(pv.to_string(), value.to_string());
        }

        /// Reads of `pv` sleep for `delay` before answering.
        pub fn delay(&self, pv: &str, delay: Duration) {
            self.delays.lock().unwrap().insert(pv.to_string(), delay);
        }

        /// Every access to `pv` fails as unavailable.
        pub fn block(&self, pv: &str) {
            self.unavailable.lock().unwrap().insert(pv.to_string());
        }

        pub fn writes(&self) -> Vec<(String, String)> {
            self.writes.lock().unwrap().clone()
        }

        pub fn reads(&self) -> Vec<String> {
            self.reads.lock().unwrap().clone()
        }

        fn check(&self, pv: &str) -> Result<(), PvError> {
            if self.unavailable.lock().unwrap().contains(pv) {
                return Err(PvError::Unavailable {
                    pv: pv.to_string(),
                    message: "blocked".into(),
                });
            }
            Ok(())
        }
    }

    impl PvClient for MemoryPv {
        fn get(&self, pv: &str, _timeout: Duration) -> Result<String, PvError> {
            self.reads.lock().unwrap().push(pv.to_string());
            self.check(pv)?;
            let delay = self.delays.lock().unwrap().get(pv).copied();
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            self.values
                .lock()
                .unwrap()
                .get(pv)
                .cloned()
                .ok_or_else(|| PvError::Unavailable {
                    pv: pv.to_string(),
                    message: "no such PV".into(),
                })
        }

        fn put(&self, pv: &str, value: &str, _timeout: Duration) -> Result<(), PvError> {
            self.check(pv)?;
            self.writes.lock().unwrap().push((pv.to_string(), value.to_string()));
            self.values.lock().unwrap().insert(pv.to_string(), value.to_string());
            Ok(())
        }
    }
}
