//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use build::{build_overrides, BuildArgs};

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Assetsmith - build scripts, style sheets and templates, once or on change
#[derive(Parser)]
#[command(name = "assetsmith")]
#[command(about = "Assetsmith - incremental script, style and template builds")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Build mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Mode {
    #[default]
    Develop,
    /// Minified scripts and compressed style sheets
    Production,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every enabled asset family
    Build {
        /// Watch for changes and rebuild incrementally (no initial build)
        #[arg(short, long)]
        watch: bool,

        /// Build mode
        #[arg(short, long, value_enum, default_value_t = Mode::Develop)]
        mode: Mode,

        /// Shorthand for --mode production
        #[arg(long, conflicts_with = "dev")]
        prod: bool,

        /// Shorthand for --mode develop
        #[arg(long)]
        dev: bool,

        /// Config file (default: assetsmith.toml found upward from cwd)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit source maps for scripts and style sheets
        #[arg(long)]
        sourcemap: bool,

        /// Minify output
        #[arg(long)]
        minify: bool,

        /// Remove output roots before building
        #[arg(long, conflicts_with = "watch")]
        clean: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a starter assetsmith.toml in the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Install the global log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "assetsmith=debug" } else { "assetsmith=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_INVALID_ARGS } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match cli.command {
        Commands::Build { watch, mode, prod, dev, config, sourcemap, minify, clean, verbose } => {
            init_logging(verbose);
            let mode = if prod {
                Mode::Production
            } else if dev {
                Mode::Develop
            } else {
                mode
            };
            build::run_build(&BuildArgs { watch, mode, config, sourcemap, minify, clean })
        }
        Commands::Init { force } => {
            init_logging(false);
            build::run_init(force)
        }
    }
}
