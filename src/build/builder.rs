//! The builder contract shared by every asset family.
//!
//! [`AssetBuilder`] owns the entry index and implements discovery, compiling,
//! writing and the watch-event decision table. Family-specific behaviour is
//! injected through a [`FamilyStrategy`] and the delegated [`Compiler`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::Span;

use crate::build::output::{remove_artifact, source_map_path, write_artifact, write_assets, write_source_map};
use crate::build::path::{entry_glob, entry_key};
use crate::build::result::{BuildResult, EntryResult};
use crate::build::script::ScriptStrategy;
use crate::build::style::StyleStrategy;
use crate::build::template::{TemplateStrategy, VariableMap, VariablesError};
use crate::build::{BuildContext, DiscoveryError, EntryMap, EntryPointIndex, IgnoreRules};
use crate::compile::{
    CompileError, CompileRequest, Compiler, ExternalBundler, StyleCompiler, TemplateRenderer,
};
use crate::config::{Family, FamilyConfig, FamilyOptions};
use crate::fmt::{FormatOptions, Formatter, IndentFormatter};
use crate::watch::{WatchEvent, WatchRoot};

/// Error raised while building or reacting to a watch event.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// A full or scoped build finished with failed entries
    #[error("{family} build failed: {failed} of {total} entries failed")]
    EntriesFailed { family: Family, failed: usize, total: usize },
    #[error("failed to write {}: {error}", path.display())]
    Write { path: PathBuf, error: io::Error },
    #[error("failed to remove {}: {error}", path.display())]
    Remove { path: PathBuf, error: io::Error },
    #[error("failed to regenerate index in {}: {error}", dir.display())]
    Index { dir: PathBuf, error: io::Error },
    #[error(transparent)]
    Variables(#[from] VariablesError),
}

/// How a strategy classifies a watched file before the generic table applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialFile {
    /// Ordinary entry or module file
    None,
    /// Generated by the builder itself (e.g. an index file)
    Derived,
    /// Configuration affecting every entry
    RootConfig,
    /// Configuration affecting entries under this directory
    ScopedConfig(PathBuf),
}

/// What a builder did in response to one watch event.
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Event concerned a derived file
    Ignored,
    /// A single entry was rebuilt
    BuiltEntry(EntryResult),
    /// Entries under one directory were rebuilt
    BuiltScope(BuildResult),
    /// Every entry was rebuilt
    BuiltAll(BuildResult),
    /// An artifact (file or directory) was removed
    RemovedOutput { output: PathBuf, existed: bool },
    /// Nothing to do
    Nothing,
}

/// Family-specific hooks around the generic build and reaction logic.
pub trait FamilyStrategy: Send {
    /// Extra glob patterns to watch besides the entry/module extensions.
    fn extra_watch_patterns(&self, _ctx: &BuildContext) -> Vec<String> {
        Vec::new()
    }

    /// Whether the project root itself must be watched (non-recursively).
    fn watches_project_root(&self) -> bool {
        false
    }

    fn classify(&self, _ctx: &BuildContext, _path: &Path) -> SpecialFile {
        SpecialFile::None
    }

    /// Runs before every full build, after discovery.
    fn prepare_full_build(&mut self, _ctx: &BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    /// Runs before single-entry and scoped builds.
    fn prepare_partial_build(&mut self, _ctx: &BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    /// Side effects of a file event, run before the rebuild decision.
    fn observe_file_event(&mut self, _ctx: &BuildContext, _event: &WatchEvent) -> Result<(), BuildError> {
        Ok(())
    }

    /// Render context for one entry.
    fn variables_for(&self, _ctx: &BuildContext, _source: &Path) -> Option<VariableMap> {
        None
    }

    /// Comment linking an artifact to its map file.
    fn source_map_comment(&self, _map_file_name: &str) -> Option<String> {
        None
    }

    /// Adjust compiled content before formatting.
    fn post_process(&self, content: String) -> String {
        content
    }
}

/// The polymorphic builder interface driven by the orchestrator and watcher.
pub trait Builder: Send {
    fn family(&self) -> Family;
    fn context(&self) -> &BuildContext;

    /// Recompute the entry index from the filesystem.
    fn discover(&mut self) -> Result<&EntryMap, BuildError>;

    /// Compile one entry. Compile and write failures are errors.
    fn build_one(&mut self, source: &Path) -> Result<EntryResult, BuildError>;

    /// Discover, then compile every entry. Entry failures are recorded in the
    /// result; only discovery and preparation failures are errors.
    fn build_all(&mut self) -> Result<BuildResult, BuildError>;

    /// React to one watch event. Any failure is fatal to the reaction.
    fn handle_event(&mut self, event: &WatchEvent) -> Result<Reaction, BuildError>;

    /// Directories to subscribe to.
    fn watch_roots(&self) -> Vec<WatchRoot>;

    /// Glob patterns selecting relevant files under the watch roots.
    fn watch_patterns(&self) -> Vec<String>;

    /// Remove the whole output root.
    fn clean(&mut self) -> Result<bool, BuildError>;
}

/// Generic builder parameterised by strategy, compiler and formatter.
pub struct AssetBuilder {
    ctx: BuildContext,
    index: EntryPointIndex,
    strategy: Box<dyn FamilyStrategy>,
    compiler: Box<dyn Compiler>,
    formatter: Box<dyn Formatter>,
    format_options: FormatOptions,
    span: Span,
}

impl std::fmt::Debug for AssetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetBuilder")
            .field("family", &self.ctx.family())
            .field("source_root", &self.ctx.source_root())
            .field("entries", &self.index.len())
            .finish()
    }
}

/// Strategy matching the context's family.
pub fn default_strategy(ctx: &BuildContext) -> Box<dyn FamilyStrategy> {
    match ctx.family_options() {
        FamilyOptions::Script(_) => Box::new(ScriptStrategy),
        FamilyOptions::Style(options) => Box::new(StyleStrategy::new(options, &ctx.options().entry_extensions)),
        FamilyOptions::Template(options) => Box::new(TemplateStrategy::new(&options.var_file_name)),
    }
}

/// Delegated compiler matching the context's family.
pub fn default_compiler(ctx: &BuildContext) -> Box<dyn Compiler> {
    let options = ctx.options();
    match ctx.family_options() {
        FamilyOptions::Script(script) => Box::new(
            ExternalBundler::new(&script.compiler)
                .with_working_dir(ctx.project_root())
                .with_minify(options.minify)
                .with_sourcemap(options.sourcemap)
                .with_externals(script.globals.keys().cloned())
                .with_options(options.compile_options.clone()),
        ),
        FamilyOptions::Style(style) => Box::new(
            StyleCompiler::new(&style.compiler)
                .with_style(style.style)
                .with_sourcemap(options.sourcemap)
                .with_load_paths(style.load_paths.iter().map(|p| ctx.resolve_path(p)).collect())
                .with_options(options.compile_options.clone()),
        ),
        FamilyOptions::Template(_) => Box::new(TemplateRenderer::from_options(&options.compile_options)),
    }
}

impl AssetBuilder {
    /// Assemble a builder from explicit parts.
    pub fn new(
        ctx: BuildContext,
        strategy: Box<dyn FamilyStrategy>,
        compiler: Box<dyn Compiler>,
    ) -> Result<Self, BuildError> {
        let rules = IgnoreRules::from_config(&ctx.options().ignore)?;
        let index = EntryPointIndex::new(ctx.source_root(), &ctx.options().entry_extensions, rules)?;
        let format_options = FormatOptions::resolve(
            ctx.project_root(),
            &ctx.options().output_extension,
            &ctx.options().format,
        );
        let span = tracing::info_span!("builder", family = %ctx.family());

        Ok(Self {
            ctx,
            index,
            strategy,
            compiler,
            formatter: Box::new(IndentFormatter),
            format_options,
            span,
        })
    }

    /// Builder for a resolved family configuration with its default strategy and compiler.
    pub fn from_config(config: FamilyConfig, project_root: &Path) -> Result<Self, BuildError> {
        let ctx = BuildContext::new(config, project_root.to_path_buf());
        let strategy = default_strategy(&ctx);
        let compiler = default_compiler(&ctx);
        Self::new(ctx, strategy, compiler)
    }

    /// Replace the delegated compiler.
    pub fn with_compiler(mut self, compiler: Box<dyn Compiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_format_options(mut self, options: FormatOptions) -> Self {
        self.format_options = options;
        self
    }

    pub fn index(&self) -> &EntryPointIndex {
        &self.index
    }

    fn key_for(&self, source: &Path) -> String {
        self.index
            .key_for(source)
            .map(str::to_string)
            .or_else(|| entry_key(source, self.ctx.source_root()))
            .unwrap_or_else(|| source.display().to_string())
    }

    /// Compile and write one entry, returning the files written.
    fn compile_entry(&self, source: &Path) -> Result<Vec<PathBuf>, BuildError> {
        let output = self.ctx.output_path(source);
        let variables = self.strategy.variables_for(&self.ctx, source);

        let mut request = CompileRequest::new(source, self.ctx.source_root());
        if let Some(vars) = &variables {
            request = request.with_variables(vars);
        }
        let compiled = self.compiler.compile(&request)?;

        let mut content = self.strategy.post_process(compiled.content);
        if !self.ctx.options().minify {
            content = self.formatter.format(&content, &self.format_options);
        }

        let mut written = vec![output.clone()];
        if let Some(map) = &compiled.source_map {
            let map_path = write_source_map(&output, map)
                .map_err(|error| BuildError::Write { path: source_map_path(&output), error })?;
            let map_name = map_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if let Some(comment) = self.strategy.source_map_comment(&map_name) {
                content = format!("{}\n{}", content.trim_end(), comment);
            }
            written.push(map_path);
        }

        write_artifact(&output, &content)
            .map_err(|error| BuildError::Write { path: output.clone(), error })?;
        written.extend(
            write_assets(&output, &compiled.assets)
                .map_err(|error| BuildError::Write { path: output.clone(), error })?,
        );

        tracing::info!(source = %source.display(), output = %output.display(), "compiled");
        Ok(written)
    }

    fn entry_result(&self, source: &Path) -> EntryResult {
        let start = Instant::now();
        let key = self.key_for(source);
        match self.compile_entry(source) {
            Ok(outputs) => EntryResult::built(key, source.to_path_buf(), outputs, start.elapsed()),
            Err(e) => {
                tracing::error!(source = %source.display(), error = %e, "compile failed");
                EntryResult::failed(key, source.to_path_buf(), e.to_string(), start.elapsed())
            }
        }
    }

    fn build_sources(&self, sources: &[PathBuf]) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::new();
        for source in sources {
            result.add_result(self.entry_result(source));
        }
        result.with_duration(start.elapsed())
    }

    fn require_success(&self, result: BuildResult) -> Result<BuildResult, BuildError> {
        if result.is_success() {
            Ok(result)
        } else {
            Err(BuildError::EntriesFailed {
                family: self.ctx.family(),
                failed: result.failed_count(),
                total: result.entries.len(),
            })
        }
    }

    /// Rebuild entries whose source lies under `dir`.
    fn build_scope(&mut self, dir: &Path) -> Result<BuildResult, BuildError> {
        self.strategy.prepare_partial_build(&self.ctx)?;
        let sources = self.index.sources_under(dir);
        tracing::info!(scope = %dir.display(), entries = sources.len(), "rebuilding scope");
        Ok(self.build_sources(&sources))
    }

    fn remove_output(&self, output: PathBuf) -> Result<Reaction, BuildError> {
        let existed =
            remove_artifact(&output).map_err(|error| BuildError::Remove { path: output.clone(), error })?;
        if existed {
            tracing::info!(output = %output.display(), "removed");
        }
        Ok(Reaction::RemovedOutput { output, existed })
    }

    fn react_to_file(&mut self, event: &WatchEvent, path: &Path) -> Result<Reaction, BuildError> {
        match self.strategy.classify(&self.ctx, path) {
            SpecialFile::Derived => Ok(Reaction::Ignored),
            SpecialFile::RootConfig => {
                self.strategy.observe_file_event(&self.ctx, event)?;
                let result = self.build_all()?;
                Ok(Reaction::BuiltAll(self.require_success(result)?))
            }
            SpecialFile::ScopedConfig(dir) => {
                self.strategy.observe_file_event(&self.ctx, event)?;
                let result = self.build_scope(&dir)?;
                Ok(Reaction::BuiltScope(self.require_success(result)?))
            }
            SpecialFile::None => {
                self.strategy.observe_file_event(&self.ctx, event)?;
                if matches!(event, WatchEvent::Added(_)) {
                    self.discover()?;
                }
                if self.index.contains_source(path) {
                    Ok(Reaction::BuiltEntry(self.build_one(path)?))
                } else {
                    let result = self.build_all()?;
                    Ok(Reaction::BuiltAll(self.require_success(result)?))
                }
            }
        }
    }

    fn react_to_removal(&mut self, event: &WatchEvent, path: &Path) -> Result<Reaction, BuildError> {
        if self.strategy.classify(&self.ctx, path) == SpecialFile::Derived {
            return Ok(Reaction::Ignored);
        }
        self.strategy.observe_file_event(&self.ctx, event)?;

        if self.index.remove_source(path).is_none() {
            return Ok(Reaction::Nothing);
        }
        let output = self.ctx.output_path(path);
        let map = source_map_path(&output);
        remove_artifact(&map).map_err(|error| BuildError::Remove { path: map, error })?;
        self.remove_output(output)
    }
}

impl Builder for AssetBuilder {
    fn family(&self) -> Family {
        self.ctx.family()
    }

    fn context(&self) -> &BuildContext {
        &self.ctx
    }

    fn discover(&mut self) -> Result<&EntryMap, BuildError> {
        let _enter = self.span.enter();
        let count = self.index.discover()?.len();
        tracing::debug!(entries = count, "discovered entries");
        Ok(self.index.entries())
    }

    fn build_one(&mut self, source: &Path) -> Result<EntryResult, BuildError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.strategy.prepare_partial_build(&self.ctx)?;

        let start = Instant::now();
        let outputs = self.compile_entry(source)?;
        Ok(EntryResult::built(self.key_for(source), source.to_path_buf(), outputs, start.elapsed()))
    }

    fn build_all(&mut self) -> Result<BuildResult, BuildError> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.discover()?;
        self.strategy.prepare_full_build(&self.ctx)?;

        let sources: Vec<PathBuf> = self.index.entries().values().cloned().collect();
        tracing::info!(entries = sources.len(), "building all entries");
        Ok(self.build_sources(&sources))
    }

    fn handle_event(&mut self, event: &WatchEvent) -> Result<Reaction, BuildError> {
        let span = self.span.clone();
        let _enter = span.enter();

        match event {
            WatchEvent::Added(path) | WatchEvent::Changed(path) => self.react_to_file(event, path),
            WatchEvent::Removed(path) => self.react_to_removal(event, path),
            WatchEvent::DirAdded(_) => Ok(Reaction::Nothing),
            WatchEvent::DirRemoved(dir) => match self.ctx.output_dir(dir) {
                Some(output) if output != self.ctx.output_root() => self.remove_output(output),
                _ => Ok(Reaction::Nothing),
            },
        }
    }

    fn watch_roots(&self) -> Vec<WatchRoot> {
        let mut roots = vec![WatchRoot::recursive(self.ctx.source_root())];
        let project_root = self.ctx.project_root();
        if self.strategy.watches_project_root() && self.ctx.source_root() != project_root {
            roots.push(WatchRoot::shallow(project_root));
        }
        roots
    }

    fn watch_patterns(&self) -> Vec<String> {
        let mut patterns =
            vec![entry_glob(self.ctx.source_root(), &self.ctx.options().watch_extensions())];
        patterns.extend(self.strategy.extra_watch_patterns(&self.ctx));
        patterns
    }

    fn clean(&mut self) -> Result<bool, BuildError> {
        let output_root = self.ctx.output_root().to_path_buf();
        let existed = remove_artifact(&output_root)
            .map_err(|error| BuildError::Remove { path: output_root.clone(), error })?;
        if existed {
            tracing::info!(family = %self.ctx.family(), output = %output_root.display(), "cleaned output root");
        }
        Ok(existed)
    }
}
