//! Assetsmith - incremental build orchestrator for web assets
//!
//! This library provides functionality to:
//! - Discover entry points for scripts, style sheets and templates
//! - Compile them through delegated compilers into an output tree
//! - React to file changes with the narrowest safe rebuild

pub mod build;
pub mod cli;
pub mod compile;
pub mod config;
pub mod fmt;
pub mod init;
pub mod orchestrator;
pub mod watch;
