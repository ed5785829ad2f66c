//! Configuration module for the assetsmith build orchestrator
//!
//! Provides types and parsing for `assetsmith.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
