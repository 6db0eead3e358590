//! Command catalog and axis-aware command dispatch for ecmc motion controllers.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

/// Command-line surface.
pub mod cli;
/// Shared constants.
pub mod constants;
/// Catalog building and controller access.
pub mod core;
/// Catalog, axis and favorites data model.
pub mod models;
/// Per-invocation application context.
pub mod state;
/// Operating system boundary.
pub mod system;
