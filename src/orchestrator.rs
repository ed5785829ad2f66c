//! Runs every enabled family builder.
//!
//! Builders share nothing but the output tree, and each owns its own output
//! root, so builds and watches run one thread per builder without locking.

use std::sync::mpsc;
use std::thread;

use crate::build::{AssetBuilder, BuildError, BuildResult, Builder};
use crate::config::{CliOverrides, ConfigDocument, ConfigError, Family, WatchConfig};
use crate::watch::{watch_builder, WatchError};

/// The set of builders for one configuration document.
#[derive(Debug, Default)]
pub struct Orchestrator {
    builders: Vec<AssetBuilder>,
}

/// Error creating the builders
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{family}: {source}")]
    Builder { family: Family, source: BuildError },
}

impl Orchestrator {
    /// Instantiate a builder for each enabled family.
    pub fn from_document(doc: &ConfigDocument, overrides: &CliOverrides) -> Result<Self, SetupError> {
        let mut builders = Vec::new();
        for family in doc.enabled_families() {
            let config = doc.family_config(family, overrides)?;
            let builder = AssetBuilder::from_config(config, doc.project_root())
                .map_err(|source| SetupError::Builder { family, source })?;
            builders.push(builder);
        }
        Ok(Self { builders })
    }

    /// Use explicit builders, e.g. with substituted compilers.
    pub fn with_builders(builders: Vec<AssetBuilder>) -> Self {
        Self { builders }
    }

    pub fn builders(&self) -> &[AssetBuilder] {
        &self.builders
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn families(&self) -> Vec<Family> {
        self.builders.iter().map(Builder::family).collect()
    }

    /// Remove every builder's output root.
    pub fn clean(&mut self) -> Result<(), BuildError> {
        for builder in &mut self.builders {
            builder.clean()?;
        }
        Ok(())
    }

    /// Build every family concurrently.
    ///
    /// All builders run to completion; the first error in family order is
    /// returned, and a family with failed entries counts as an error.
    pub fn build(&mut self) -> Result<Vec<(Family, BuildResult)>, BuildError> {
        let outcomes: Vec<(Family, Result<BuildResult, BuildError>)> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .builders
                .iter_mut()
                .map(|builder| {
                    let family = builder.family();
                    (family, scope.spawn(move || build_family(builder)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(family, handle)| {
                    let outcome = handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                    (family, outcome)
                })
                .collect()
        });

        let mut results = Vec::new();
        for (family, outcome) in outcomes {
            results.push((family, outcome?));
        }
        Ok(results)
    }

    /// Watch every family until one of them fails.
    ///
    /// Each builder moves to its own thread. The first failure is returned
    /// while the remaining watchers are left running for the caller to exit.
    pub fn watch(self, config: &WatchConfig) -> Result<(), WatchError> {
        let (tx, rx) = mpsc::channel();
        for mut builder in self.builders {
            let tx = tx.clone();
            let config = config.clone();
            thread::spawn(move || {
                if let Err(error) = watch_builder(&mut builder, &config) {
                    let _ = tx.send(error);
                }
            });
        }
        drop(tx);

        match rx.recv() {
            Ok(error) => Err(error),
            Err(_) => Ok(()),
        }
    }
}

fn build_family(builder: &mut AssetBuilder) -> Result<BuildResult, BuildError> {
    let result = builder.build_all()?;
    for failure in result.failures() {
        tracing::error!(family = %builder.family(), source = %failure.source.display(), "entry failed");
    }
    tracing::info!(family = %builder.family(), "{}", result.summary());

    if result.is_success() {
        Ok(result)
    } else {
        Err(BuildError::EntriesFailed {
            family: builder.family(),
            failed: result.failed_count(),
            total: result.entries.len(),
        })
    }
}
