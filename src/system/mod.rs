//! # System Interaction Layer
//!
//! Boundary between the core logic and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns external programs, captures their output and kills
//!   them when a deadline passes.
//! - **`ca_client`**: the production [`PvClient`](crate::core::pv::PvClient),
//!   driving the EPICS `caget`/`caput` command-line tools through the executor.

/// `caget`/`caput` PV client.
pub mod ca_client;
/// External process execution with a deadline.
pub mod executor;
