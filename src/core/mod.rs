// src/core/mod.rs

/// Axis chain walk and real/virtual checks.
pub mod axis_resolver;
/// Content hashes for derived catalogs.
pub mod cache;
/// Parser source and header docs into a catalog.
pub mod catalog_builder;
/// Derived catalogs.
pub mod catalog_filter;
/// Catalog and blocklist files.
pub mod catalog_io;
/// Command/readback exchange.
pub mod dispatcher;
/// Header documentation blocks.
pub mod doc_matcher;
/// Saved invocations.
pub mod favorites;
/// C tokenizer for the scanner.
pub mod lexer;
/// Config directory and path expansion.
pub mod paths;
/// PV access.
pub mod pv;
/// Command signatures in the parser source.
pub mod scanner;
/// `config.toml`.
pub mod settings;
/// Reading sources and headers.
pub mod sources;
