//! Emission plugin declarations.
//!
//! A small closed set of tagged variants dispatched by the emitter in
//! declaration order. Copying static trees and binding an HTML template are
//! output-side concerns; nothing here participates in graph construction.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_html_filename() -> String {
    "index.html".to_string()
}

/// One declared emission step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum EmitPlugin {
    /// Copy a file or directory verbatim into the output tree.
    ///
    /// Directories are copied recursively with structure preserved. A missing
    /// source is a fatal configuration error at emit time, never a silent skip.
    CopyStatic {
        /// Source path, resolved against the first resolve root.
        from: PathBuf,
        /// Destination path relative to the output directory.
        to: PathBuf,
    },

    /// Render an HTML template with the fingerprinted bundle names bound in.
    InjectHtml {
        /// Path to the template file.
        template: PathBuf,
        /// Output filename relative to the output directory.
        #[serde(default = "default_html_filename")]
        filename: String,
        /// Page title passed to the template context.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl EmitPlugin {
    /// Convenience constructor for a static copy step.
    pub fn copy_static(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        EmitPlugin::CopyStatic {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Convenience constructor for an HTML binding step with defaults.
    pub fn inject_html(template: impl Into<PathBuf>) -> Self {
        EmitPlugin::InjectHtml {
            template: template.into(),
            filename: default_html_filename(),
            title: None,
        }
    }
}
