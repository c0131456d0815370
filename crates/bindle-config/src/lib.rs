//! # bindle-config
//!
//! Build configuration model for the bindle bundler core.
//!
//! The core pipeline accepts only a structured [`BuildConfig`] value; reading a
//! declarative config file (JSON, JS, whatever) is the caller's concern. This
//! crate defines that value plus its validation strategies.
//!
//! ## Quick Start
//!
//! ```
//! use bindle_config::{BuildConfig, EmitPlugin, TransformKind, TransformRule};
//!
//! let config = BuildConfig::builder("dist")
//!     .entry("index", "./src/index.js")
//!     .rule(TransformRule::new(r"\.css$", TransformKind::style()))
//!     .rule(TransformRule::new(r"\.js$", TransformKind::Script).exclude("node_modules"))
//!     .plugin(EmitPlugin::copy_static("public/favicon.ico", "public/favicon.ico"))
//!     .build();
//!
//! assert!(config.validate_schema().is_ok());
//! ```

pub mod config;
pub mod error;
pub mod plugins;
pub mod rules;
pub mod validation;

pub use config::{AssetOptions, BuildConfig, BuildConfigBuilder, OutputConfig, ResolveConfig};
pub use error::{ConfigError, Result};
pub use plugins::EmitPlugin;
pub use rules::{StyleOptions, TransformKind, TransformRule};
pub use validation::{ConfigValidator, FsValidator, SchemaValidator};
