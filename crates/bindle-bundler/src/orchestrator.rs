//! Build orchestration.
//!
//! [`Bundler`] owns the configuration and sequences the phases: validate,
//! resolve + transform + graph-build, compute artifacts, write the output
//! tree. Each phase either completes or yields the build's single terminal
//! error; nothing downstream runs after a failure, and cancellation is
//! observed between phases as well as inside graph construction.

use std::path::PathBuf;

use bindle_config::BuildConfig;
use bindle_graph::{AssetResolver, CancelToken, GraphBuilder, TransformPipeline};
use tracing::{debug, info_span};

use crate::emit::{BuildResult, Emitter};
use crate::error::{EmissionError, Error, Result};
use crate::writer;

/// A configured build, ready to run.
///
/// Running the same bundler twice over an unchanged source snapshot
/// produces byte-identical output.
pub struct Bundler {
    config: BuildConfig,
}

impl Bundler {
    /// Validate the configuration's shape and take ownership of it.
    /// Filesystem-dependent validation runs at [`Bundler::run`].
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate_schema()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run the full build: graph construction, artifact computation, output
    /// writing. Returns the artifact set that was written.
    pub fn run(&self, cancel: &CancelToken) -> Result<BuildResult> {
        let span = info_span!("build", entries = self.config.entries.len());
        let _guard = span.enter();

        self.config.validate_fs()?;

        let root = self.default_root()?;
        let resolver = AssetResolver::new(&self.config.resolve, &root);
        let pipeline = TransformPipeline::new(&self.config, resolver.clone())?;
        let builder = GraphBuilder::new(resolver.clone(), pipeline);

        let graph = builder
            .build(&self.config.entries, cancel)
            .map_err(Error::from_graph)?;
        debug!(modules = graph.len(), "graph constructed");

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let emitter = Emitter::new(&self.config, resolver.primary_root().to_path_buf());
        let result = emitter.emit(&graph)?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        writer::write_artifacts(
            &result.artifacts,
            &self.config.output.dir,
            self.config.output.clean,
        )?;
        debug!(artifacts = result.artifacts.len(), "build complete");
        Ok(result)
    }

    fn default_root(&self) -> Result<PathBuf> {
        if let Some(first) = self.config.resolve.roots.first() {
            if first.is_absolute() {
                return Ok(first.clone());
            }
        }
        std::env::current_dir().map_err(|source| {
            Error::Emission(EmissionError::Io {
                path: PathBuf::from("."),
                source,
            })
        })
    }
}
