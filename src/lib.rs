// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod builder;
pub mod config;
pub mod database;
pub mod guard;
pub mod ident;
pub mod infer;
pub mod repl;
pub mod source;

#[cfg(test)]
mod test_utils;

pub use crate::core::{Result, SchemaError, TabqlError};
pub use database::{Database, Outcome};
