//! Pluggable config validation strategies.
//!
//! Separates schema validation (pure, for library use) from filesystem
//! validation (pre-flight existence checks, for callers driving real builds).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::BuildConfig;
use crate::error::{ConfigError, Result};
use crate::plugins::EmitPlugin;

/// Trait for pluggable config validation strategies.
pub trait ConfigValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks).
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        if config.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        // IndexMap already dedups keys; catch entries whose names collide
        // after the [name] substitution (case-insensitive filesystems).
        let mut seen = HashSet::new();
        for name in config.entries.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "entry names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::DuplicateEntry(name.clone()));
            }
        }

        for rule in &config.rules {
            compile_check(&rule.test)?;
            if let Some(exclude) = &rule.exclude {
                compile_check(exclude)?;
            }
        }

        let pattern = &config.output.filename_pattern;
        if !pattern.contains("[hash]") && !pattern.contains("[fullhash]") {
            return Err(ConfigError::MissingHashToken(pattern.clone()));
        }
        if config.entries.len() > 1 && !pattern.contains("[name]") {
            return Err(ConfigError::MissingNameToken(pattern.clone()));
        }

        for ext in &config.resolve.extensions {
            if !ext.starts_with('.') {
                return Err(ConfigError::InvalidValue(format!(
                    "extension `{ext}` must start with a dot"
                )));
            }
        }

        Ok(())
    }
}

fn compile_check(pattern: &str) -> Result<()> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidRulePattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Filesystem validator: entries, roots, and HTML templates must exist.
///
/// Relative paths are anchored the way the build anchors them: against the
/// first configured resolve root, falling back to the working directory.
pub struct FsValidator;

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        for root in &config.resolve.roots {
            if !root.is_dir() {
                return Err(ConfigError::RootNotFound(root.clone()));
            }
        }

        for path in config.entries.values() {
            if !anchored(config, path).exists() {
                return Err(ConfigError::EntryNotFound(path.clone()));
            }
        }

        for plugin in &config.plugins {
            if let EmitPlugin::InjectHtml { template, .. } = plugin {
                if !anchored(config, template).is_file() {
                    return Err(ConfigError::TemplateNotFound(template.clone()));
                }
            }
            // CopyStatic sources are deliberately not checked here: a missing
            // copy source is the emitter's fatal error, verified against the
            // same snapshot the build reads.
        }

        Ok(())
    }
}

fn anchored(config: &BuildConfig, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config.resolve.roots.first() {
        Some(root) => root.join(path),
        None => path.to_path_buf(),
    }
}
