//! Infrastructure adapters for the process environment, config, and logging.

pub mod config;
pub mod env;
pub mod logging;
