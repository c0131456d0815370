//! Artifact computation.
//!
//! The emitter folds a finished graph into a complete list of output
//! artifacts, entirely in memory: serialized bundles, source maps, side
//! assets, static copies, bound HTML, and the manifest. Nothing here writes
//! to disk; the output-directory lifecycle belongs to the writer, which only
//! runs once every artifact exists and every precondition has held.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bindle_config::{BuildConfig, EmitPlugin};
use bindle_graph::{DependencyGraph, ModuleId, SideAssetKind};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info_span};

use crate::error::{EmissionError, Error, Result};
use crate::fingerprint;
use crate::html::{self, HtmlBinding};
use crate::{copy, runtime};

/// One computed output file.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Logical name (entry name, plugin filename, or asset filename).
    pub name: String,
    /// Output-relative filename, fingerprinted where applicable.
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Bundle,
    SourceMap,
    Stylesheet,
    EmittedAsset,
    CopiedStatic,
    Html,
    Manifest,
}

/// Everything a successful build produced.
#[derive(Debug)]
pub struct BuildResult {
    /// All artifacts in emission order; the manifest artifact is last.
    pub artifacts: Vec<Artifact>,
    /// Logical name -> fingerprinted output filename.
    pub manifest: IndexMap<String, String>,
}

impl BuildResult {
    /// Look up an artifact by logical name.
    pub fn artifact(&self, name: &str) -> std::result::Result<&Artifact, EmissionError> {
        self.artifacts
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| EmissionError::UnknownLogicalName {
                name: name.to_string(),
            })
    }

    /// All artifacts of one kind, in emission order.
    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }
}

/// Computes the artifact set for a finished graph.
pub struct Emitter<'a> {
    config: &'a BuildConfig,
    root: PathBuf,
}

impl<'a> Emitter<'a> {
    /// `root` is the primary resolve root; module registry keys and copy
    /// sources are made relative to it.
    pub fn new(config: &'a BuildConfig, root: PathBuf) -> Self {
        // Module identities are canonicalized, so the root must be too or
        // strip_prefix never matches behind a symlinked tree.
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Self { config, root }
    }

    pub fn emit(&self, graph: &DependencyGraph) -> Result<BuildResult> {
        let span = info_span!("emit", entries = graph.entries().len());
        let _guard = span.enter();

        let keys = self.module_keys(graph);
        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut manifest: IndexMap<String, String> = IndexMap::new();

        for (name, entry_id) in graph.entries() {
            self.emit_bundle(graph, name, entry_id, &keys, &mut artifacts, &mut manifest)?;
        }
        self.emit_side_assets(graph, &mut artifacts);

        for plugin in &self.config.plugins {
            match plugin {
                EmitPlugin::CopyStatic { from, to } => {
                    let from = self.absolute(from);
                    for (filename, bytes) in copy::collect(&from, to)? {
                        artifacts.push(Artifact {
                            name: filename.clone(),
                            filename,
                            bytes,
                            kind: ArtifactKind::CopiedStatic,
                        });
                    }
                }
                EmitPlugin::InjectHtml {
                    template,
                    filename,
                    title,
                } => {
                    let html = self.render_html(template, title.as_deref(), &artifacts, &manifest)?;
                    manifest.insert(filename.clone(), filename.clone());
                    artifacts.push(Artifact {
                        name: filename.clone(),
                        filename: filename.clone(),
                        bytes: html.into_bytes(),
                        kind: ArtifactKind::Html,
                    });
                }
            }
        }

        let manifest_json =
            serde_json::to_vec_pretty(&manifest).expect("manifest map serializes");
        artifacts.push(Artifact {
            name: "manifest.json".to_string(),
            filename: "manifest.json".to_string(),
            bytes: manifest_json,
            kind: ArtifactKind::Manifest,
        });

        debug!(artifacts = artifacts.len(), "artifact set computed");
        Ok(BuildResult {
            artifacts,
            manifest,
        })
    }

    fn emit_bundle(
        &self,
        graph: &DependencyGraph,
        name: &str,
        entry_id: &ModuleId,
        keys: &HashMap<ModuleId, String>,
        artifacts: &mut Vec<Artifact>,
        manifest: &mut IndexMap<String, String>,
    ) -> Result<()> {
        let order = graph.post_order(entry_id).map_err(Error::from_graph)?;
        let modules: Vec<(String, _)> = order
            .iter()
            .map(|record| (keys[&record.id].clone(), *record))
            .collect();
        let entry_key = &keys[entry_id];

        let serialized = runtime::serialize(entry_key, &modules, keys);
        let hash = fingerprint::content_hash(serialized.code.as_bytes());
        let filename = fingerprint::substitute(&self.config.output.filename_pattern, name, &hash);

        manifest.insert(name.to_string(), filename.clone());
        let mut code = serialized.code;
        if self.config.output.source_maps {
            let map_filename = format!("{filename}.map");
            code.push_str(&format!("//# sourceMappingURL={map_filename}\n"));
            let map_json = serialized.map.to_json(&filename);
            manifest.insert(format!("{name}.map"), map_filename.clone());
            artifacts.push(Artifact {
                name: format!("{name}.map"),
                filename: map_filename,
                bytes: map_json.into_bytes(),
                kind: ArtifactKind::SourceMap,
            });
        }

        artifacts.push(Artifact {
            name: name.to_string(),
            filename,
            bytes: code.into_bytes(),
            kind: ArtifactKind::Bundle,
        });
        Ok(())
    }

    /// Side assets in graph discovery order, emitted once each. Filenames
    /// are content-addressed, so filename dedup is content dedup.
    fn emit_side_assets(&self, graph: &DependencyGraph, artifacts: &mut Vec<Artifact>) {
        for record in graph.modules() {
            for asset in &record.side_assets {
                if artifacts.iter().any(|a| a.filename == asset.filename) {
                    continue;
                }
                artifacts.push(Artifact {
                    name: asset.filename.clone(),
                    filename: asset.filename.clone(),
                    bytes: asset.bytes.clone(),
                    kind: match asset.kind {
                        SideAssetKind::Stylesheet => ArtifactKind::Stylesheet,
                        SideAssetKind::Binary => ArtifactKind::EmittedAsset,
                    },
                });
            }
        }
    }

    fn render_html(
        &self,
        template: &Path,
        title: Option<&str>,
        artifacts: &[Artifact],
        manifest: &IndexMap<String, String>,
    ) -> Result<String> {
        let public = &self.config.output.public_path;
        let scripts: Vec<String> = artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::Bundle)
            .map(|a| public_url(public, &a.filename))
            .collect();
        let styles: Vec<String> = artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::Stylesheet)
            .map(|a| public_url(public, &a.filename))
            .collect();
        let template_path = self.absolute(template);
        let binding = HtmlBinding {
            template: &template_path,
            title,
            public_path: public,
        };
        Ok(html::render(&binding, &scripts, &styles, manifest)?)
    }

    /// Registry key for every module: primary-root-relative path with
    /// forward slashes.
    fn module_keys(&self, graph: &DependencyGraph) -> HashMap<ModuleId, String> {
        graph
            .modules()
            .map(|record| {
                let rel = record
                    .id
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or_else(|_| record.id.path());
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                (record.id.clone(), key)
            })
            .collect()
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn public_url(public_path: &str, filename: &str) -> String {
    let base = public_path.trim_end_matches('/');
    format!("{base}/{filename}")
}
