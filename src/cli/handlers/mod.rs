// src/cli/handlers/mod.rs

// One module per CLI action.

/// `axes`: axis chain discovery.
pub mod axes;
/// `build`: catalog generation.
pub mod build;
/// Helpers shared by the handlers.
pub mod commons;
/// `exec`: single command dispatch.
pub mod exec;
/// `fav`: saved invocations.
pub mod fav;
/// `filter`: derived catalogs.
pub mod filter;
/// `list`: catalog browsing.
pub mod list;
/// `probe`: quick axis check.
pub mod probe;
/// `resolve`: axis lookup.
pub mod resolve;
/// `show`: one command in detail.
pub mod show;
