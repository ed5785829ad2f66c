//! Build command implementations (build, init)

use std::path::PathBuf;
use std::process::ExitCode;

use super::{Mode, EXIT_ERROR, EXIT_SUCCESS};
use crate::config::{load_config, CliOverrides};
use crate::orchestrator::Orchestrator;

/// Options of the `build` command after flag resolution.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    pub watch: bool,
    pub mode: Mode,
    pub config: Option<PathBuf>,
    pub sourcemap: bool,
    pub minify: bool,
    pub clean: bool,
}

/// Config overrides implied by the command line.
///
/// Production mode implies minification; flags left off leave the config alone.
pub fn build_overrides(args: &BuildArgs) -> CliOverrides {
    let minify = args.minify || args.mode == Mode::Production;
    CliOverrides {
        sourcemap: args.sourcemap.then_some(true),
        minify: minify.then_some(true),
    }
}

/// Run the build command
pub fn run_build(args: &BuildArgs) -> ExitCode {
    let doc = match load_config(args.config.as_deref()) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    match doc.path() {
        Some(path) => tracing::debug!(config = %path.display(), "using config"),
        None => tracing::debug!(root = %doc.project_root().display(), "no assetsmith.toml found"),
    }

    let mut orchestrator = match Orchestrator::from_document(&doc, &build_overrides(args)) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if orchestrator.is_empty() {
        tracing::warn!("no asset families enabled; add e.g. enable = [\"js\", \"css\", \"html\"] to assetsmith.toml");
        return ExitCode::from(EXIT_SUCCESS);
    }

    if args.watch {
        let watch_config = match doc.watch_config() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };

        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        return match orchestrator.watch(&watch_config) {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    if args.clean {
        if let Err(e) = orchestrator.clean() {
            eprintln!("Clean failed: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    match orchestrator.build() {
        Ok(results) => {
            for (family, result) in &results {
                println!("{}: {}", family, result.summary());
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the init command
pub fn run_init(force: bool) -> ExitCode {
    use crate::init::init_project;

    let dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match init_project(&dir, force) {
        Ok(path) => {
            println!("Created {}", path.display());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Family;

    #[test]
    fn test_production_implies_minify() {
        let args = BuildArgs { mode: Mode::Production, ..Default::default() };
        let overrides = build_overrides(&args);
        assert_eq!(overrides.minify, Some(true));
        assert_eq!(overrides.sourcemap, None);

        let style = overrides.for_family(Family::Style);
        assert_eq!(style.get("style").and_then(|v| v.as_str()), Some("compressed"));
    }

    #[test]
    fn test_develop_leaves_config_alone() {
        let overrides = build_overrides(&BuildArgs::default());
        assert_eq!(overrides, CliOverrides::default());
        assert!(overrides.for_family(Family::Script).is_empty());
    }

    #[test]
    fn test_sourcemap_flag() {
        let args = BuildArgs { sourcemap: true, ..Default::default() };
        let table = build_overrides(&args).for_family(Family::Script);
        assert_eq!(table.get("sourcemap").and_then(|v| v.as_bool()), Some(true));
    }
}
