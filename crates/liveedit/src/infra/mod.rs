//! Infrastructure adapters for parsing, storage, config, and logging.

pub mod config;
pub mod fs;
pub mod logging;
pub mod sourcemap;
pub mod syntax;
pub mod workspace;
