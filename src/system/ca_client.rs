// src/system/ca_client.rs

//! [`PvClient`] backed by the Channel Access command line tools.

use crate::{
    core::pv::{PvClient, PvError},
    system::executor::{self, ExecutionError},
};
use log::debug;
use std::time::Duration;

/// Extra time granted to the tool beyond its own Channel Access timeout.
const PROCESS_GRACE: Duration = Duration::from_millis(500);

/// Runs `caget -t -w <secs> <pv>` and `caput -t -w <secs> <pv> <value>`.
#[derive(Debug, Clone)]
pub struct CaCliClient {
    caget: Vec<String>,
    caput: Vec<String>,
}

impl Default for CaCliClient {
    fn default() -> Self {
        Self {
            caget: vec!["caget".into()],
            caput: vec!["caput".into()],
        }
    }
}

impl CaCliClient {
    /// Uses custom command lines, e.g. `/opt/epics/bin/caget -S`.
    pub fn new(caget: &str, caput: &str) -> Result<Self, ExecutionError> {
        Ok(Self {
            caget: executor::split_command_line(caget)?,
            caput: executor::split_command_line(caput)?,
        })
    }

    fn run(&self, base: &[String], args: &[&str], pv: &str, timeout: Duration) -> Result<String, PvError> {
        let mut argv = base.to_vec();
        argv.extend(["-t".to_string(), "-w".to_string(), format!("{}", timeout.as_secs_f64())]);
        argv.extend(args.iter().map(|a| a.to_string()));
        debug!("Running {:?}", argv);

        executor::execute_and_capture_output(&argv, timeout + PROCESS_GRACE).map_err(|e| match e {
            ExecutionError::TimedOut { .. } => PvError::Timeout {
                pv: pv.to_string(),
                timeout,
            },
            ExecutionError::NonZeroExitStatus { stderr, .. } if stderr.is_empty() => PvError::Unavailable {
                pv: pv.to_string(),
                message: "tool exited with an error".into(),
            },
            ExecutionError::NonZeroExitStatus { stderr, .. } => PvError::Unavailable {
                pv: pv.to_string(),
                message: stderr,
            },
            ExecutionError::InvalidUtf8Output { .. } => PvError::Invalid {
                pv: pv.to_string(),
                message: e.to_string(),
            },
            other => PvError::Unavailable {
                pv: pv.to_string(),
                message: other.to_string(),
            },
        })
    }
}

impl PvClient for CaCliClient {
    fn get(&self, pv: &str, timeout: Duration) -> Result<String, PvError> {
        self.run(&self.caget, &[pv], pv, timeout)
    }

    fn put(&self, pv: &str, value: &str, timeout: Duration) -> Result<(), PvError> {
        self.run(&self.caput, &[pv, value], pv, timeout).map(|_| ())
    }
}
