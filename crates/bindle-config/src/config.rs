//! The immutable build configuration value.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plugins::EmitPlugin;
use crate::rules::TransformRule;
use crate::validation::{ConfigValidator, FsValidator, SchemaValidator};

fn default_extensions() -> Vec<String> {
    vec![".js".to_string()]
}

fn default_filename_pattern() -> String {
    "[name].[hash].js".to_string()
}

fn default_public_path() -> String {
    "/".to_string()
}

fn default_clean() -> bool {
    true
}

fn default_source_maps() -> bool {
    true
}

fn default_inline_limit() -> u64 {
    8 * 1024
}

/// Immutable input for one build invocation.
///
/// Owned exclusively by the build orchestrator; never mutated after
/// construction. Constructed either directly, via [`BuildConfig::builder`],
/// or deserialized from whatever declarative source the caller prefers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Entry-point name -> source path, in declaration order. One bundle is
    /// produced per entry.
    pub entries: IndexMap<String, PathBuf>,

    /// Ordered transform rules; first match wins.
    #[serde(default)]
    pub rules: Vec<TransformRule>,

    /// Ordered emission plugins, dispatched after bundles are serialized.
    #[serde(default)]
    pub plugins: Vec<EmitPlugin>,

    /// Output settings.
    pub output: OutputConfig,

    /// Specifier resolution settings.
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Binary asset settings.
    #[serde(default)]
    pub assets: AssetOptions,
}

/// Output directory and filename settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination directory. The build may fully delete and recreate it.
    pub dir: PathBuf,

    /// Bundle filename pattern. `[name]` is replaced by the entry name and
    /// `[hash]` (alias `[fullhash]`) by the content fingerprint.
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,

    /// Clear the output directory before writing artifacts.
    #[serde(default = "default_clean")]
    pub clean: bool,

    /// Prefix applied to asset URLs referenced from generated HTML.
    #[serde(default = "default_public_path")]
    pub public_path: String,

    /// Emit source maps next to bundles.
    #[serde(default = "default_source_maps")]
    pub source_maps: bool,
}

impl OutputConfig {
    /// Output config for a directory, with default filename pattern.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            filename_pattern: default_filename_pattern(),
            clean: true,
            public_path: default_public_path(),
            source_maps: true,
        }
    }
}

/// Specifier resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Extensions probed, in order, for specifiers without a recognized one.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Root directories for bare/absolute specifiers, probed in order.
    /// Defaults to the process working directory when empty.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Directory names that are opaque to dependency discovery: files inside
    /// them resolve as leaves but are never scanned for further imports.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            roots: Vec::new(),
            exclude_dirs: vec!["node_modules".to_string()],
        }
    }
}

/// Binary asset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetOptions {
    /// Assets at or under this many bytes are inlined as data URIs; larger
    /// ones are emitted as separate fingerprinted files.
    #[serde(default = "default_inline_limit")]
    pub inline_limit: u64,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            inline_limit: default_inline_limit(),
        }
    }
}

impl BuildConfig {
    /// Start building a config for the given output directory.
    pub fn builder(output_dir: impl Into<PathBuf>) -> BuildConfigBuilder {
        BuildConfigBuilder {
            config: BuildConfig {
                entries: IndexMap::new(),
                rules: Vec::new(),
                plugins: Vec::new(),
                output: OutputConfig::new(output_dir),
                resolve: ResolveConfig::default(),
                assets: AssetOptions::default(),
            },
        }
    }

    /// Schema-only validation: no filesystem checks.
    pub fn validate_schema(&self) -> Result<()> {
        SchemaValidator.validate(self)
    }

    /// Filesystem validation: entries, roots, and templates must exist.
    /// Implies schema validation.
    pub fn validate_fs(&self) -> Result<()> {
        FsValidator.validate(self)
    }
}

/// Fluent builder for [`BuildConfig`].
#[derive(Debug)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    /// Declare an entry point.
    pub fn entry(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.config.entries.insert(name.into(), path.into());
        self
    }

    /// Append a transform rule. Order matters: first match wins.
    pub fn rule(mut self, rule: TransformRule) -> Self {
        self.config.rules.push(rule);
        self
    }

    /// Append an emission plugin.
    pub fn plugin(mut self, plugin: EmitPlugin) -> Self {
        self.config.plugins.push(plugin);
        self
    }

    /// Override the bundle filename pattern.
    pub fn filename_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.output.filename_pattern = pattern.into();
        self
    }

    /// Override the public path prefix.
    pub fn public_path(mut self, prefix: impl Into<String>) -> Self {
        self.config.output.public_path = prefix.into();
        self
    }

    /// Toggle output directory clearing.
    pub fn clean(mut self, clean: bool) -> Self {
        self.config.output.clean = clean;
        self
    }

    /// Toggle source map emission.
    pub fn source_maps(mut self, enabled: bool) -> Self {
        self.config.output.source_maps = enabled;
        self
    }

    /// Set the probed extension list.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.resolve.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Add a resolution root.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.resolve.roots.push(root.into());
        self
    }

    /// Set the directories that are opaque to dependency discovery.
    pub fn exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.resolve.exclude_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the data-URI inlining threshold in bytes.
    pub fn inline_limit(mut self, bytes: u64) -> Self {
        self.config.assets.inline_limit = bytes;
        self
    }

    /// Finish, returning the immutable config.
    pub fn build(self) -> BuildConfig {
        self.config
    }
}
