//! HTML template binding.
//!
//! Renders the configured template through minijinja with the build's
//! manifest bound into the context, then injects tags for the fingerprinted
//! artifacts: stylesheet links before `</head>` and deferred script tags
//! before `</body>`. Templates that don't carry those markers still work;
//! the tags are appended at the end instead.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use minijinja::{context, Environment};

use crate::error::EmissionError;

pub(crate) struct HtmlBinding<'a> {
    pub template: &'a Path,
    pub title: Option<&'a str>,
    pub public_path: &'a str,
}

/// Render the template and inject artifact tags. `scripts` and `styles`
/// carry ready-made URLs (public path already applied).
pub(crate) fn render(
    binding: &HtmlBinding<'_>,
    scripts: &[String],
    styles: &[String],
    manifest: &IndexMap<String, String>,
) -> Result<String, EmissionError> {
    let source = fs::read_to_string(binding.template).map_err(|source| EmissionError::Io {
        path: binding.template.to_path_buf(),
        source,
    })?;

    let env = Environment::new();
    let rendered = env
        .render_str(
            &source,
            context! {
                title => binding.title.unwrap_or("Bindle App"),
                base => binding.public_path,
                manifest => manifest,
            },
        )
        .map_err(|e| EmissionError::TemplateRender {
            template: binding.template.to_path_buf(),
            message: e.to_string(),
        })?;

    let style_tags: String = styles
        .iter()
        .map(|href| format!("<link rel=\"stylesheet\" href=\"{href}\">\n"))
        .collect();
    let script_tags: String = scripts
        .iter()
        .map(|src| format!("<script defer src=\"{src}\"></script>\n"))
        .collect();

    let with_styles = inject_before(rendered, "</head>", &style_tags);
    Ok(inject_before(with_styles, "</body>", &script_tags))
}

fn inject_before(mut html: String, marker: &str, tags: &str) -> String {
    if tags.is_empty() {
        return html;
    }
    match html.find(marker) {
        Some(at) => {
            html.insert_str(at, tags);
            html
        }
        None => {
            html.push_str(tags);
            html
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn template(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("index.html");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn tags_land_before_their_markers() {
        let dir = TempDir::new().unwrap();
        let path = template(
            &dir,
            "<html><head><title>{{ title }}</title></head><body></body></html>",
        );
        let html = render(
            &HtmlBinding {
                template: &path,
                title: Some("App"),
                public_path: "/",
            },
            &["/index.abc.js".to_string()],
            &["/assets/deadbeef.css".to_string()],
            &IndexMap::new(),
        )
        .unwrap();

        assert!(html.contains("<title>App</title>"));
        let link_at = html.find("<link rel=\"stylesheet\"").unwrap();
        let head_close = html.find("</head>").unwrap();
        assert!(link_at < head_close);
        let script_at = html.find("<script defer").unwrap();
        let body_close = html.find("</body>").unwrap();
        assert!(script_at < body_close);
    }

    #[test]
    fn markerless_template_gets_tags_appended() {
        let dir = TempDir::new().unwrap();
        let path = template(&dir, "<p>hi</p>");
        let html = render(
            &HtmlBinding {
                template: &path,
                title: None,
                public_path: "/",
            },
            &["/index.abc.js".to_string()],
            &[],
            &IndexMap::new(),
        )
        .unwrap();
        assert!(html.starts_with("<p>hi</p>"));
        assert!(html.contains("<script defer src=\"/index.abc.js\">"));
    }

    #[test]
    fn template_errors_carry_the_message() {
        let dir = TempDir::new().unwrap();
        let path = template(&dir, "{{ title");
        let err = render(
            &HtmlBinding {
                template: &path,
                title: None,
                public_path: "/",
            },
            &[],
            &[],
            &IndexMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EmissionError::TemplateRender { .. }));
    }

    #[test]
    fn manifest_is_available_to_the_template() {
        let dir = TempDir::new().unwrap();
        let path = template(&dir, "{{ manifest[\"index\"] }}");
        let mut manifest = IndexMap::new();
        manifest.insert("index".to_string(), "index.abc.js".to_string());
        let html = render(
            &HtmlBinding {
                template: &path,
                title: None,
                public_path: "/",
            },
            &[],
            &[],
            &manifest,
        )
        .unwrap();
        assert_eq!(html, "index.abc.js");
    }
}
