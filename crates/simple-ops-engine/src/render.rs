//! Chart rendering
//!
//! [`ChartRenderer`] is the seam the `helm` action renders through. The
//! built-in [`TemplateRenderer`] renders chart templates with MiniJinja,
//! client-side only.

use minijinja::Environment;
use serde::Serialize;
use simple_ops_core::Values;

use crate::chart::Chart;
use crate::error::{EngineError, Result, TemplateError};
use crate::filters;

/// Identity of the release being rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub service: String,
}

impl ReleaseInfo {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            service: "simple-ops".to_string(),
        }
    }
}

/// Output of rendering one chart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Multi-document manifest stream
    pub manifest: String,
    /// Bundled CRD files as (chart path, content), sorted by path
    pub crds: Vec<(String, String)>,
}

/// Renders a chart with the given values
pub trait ChartRenderer {
    fn render(&self, chart: &Chart, values: &Values, release: &ReleaseInfo) -> Result<Rendered>;
}

#[derive(Serialize)]
struct ChartInfo<'a> {
    name: &'a str,
    version: String,
    #[serde(rename = "appVersion")]
    app_version: Option<&'a str>,
}

/// MiniJinja chart renderer
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    strict: bool,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on undefined variables instead of rendering them empty
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Create a configured MiniJinja environment
    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        }
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);

        env
    }
}

/// Helpers are only reachable through `include`/`import`
fn is_emitted(template: &str) -> bool {
    let file_name = template.rsplit('/').next().unwrap_or(template);
    !file_name.starts_with('_') && file_name != "NOTES.txt"
}

impl ChartRenderer for TemplateRenderer {
    fn render(&self, chart: &Chart, values: &Values, release: &ReleaseInfo) -> Result<Rendered> {
        let values = chart.values.merged(values);
        let mut env = self.create_environment();

        let mut sources = Vec::new();
        for (name, data) in chart.templates() {
            let source = String::from_utf8(data.to_vec()).map_err(|e| EngineError::Chart {
                chart: chart.name().to_string(),
                message: format!("templates/{} is not UTF-8: {}", name, e),
            })?;
            env.add_template_owned(name.to_string(), source.clone())
                .map_err(|e| TemplateError::from_minijinja(e, name, &source))?;
            sources.push((name, source));
        }

        let ctx = minijinja::context! {
            values => values.inner(),
            release => release,
            chart => ChartInfo {
                name: chart.name(),
                version: chart.version().to_string(),
                app_version: chart.metadata.app_version.as_deref(),
            },
        };

        let mut manifest = String::new();
        for (name, source) in &sources {
            if !is_emitted(name) {
                continue;
            }
            let tmpl = env
                .get_template(name)
                .map_err(|e| TemplateError::from_minijinja(e, name, source))?;
            let output = tmpl
                .render(&ctx)
                .map_err(|e| TemplateError::from_minijinja(e, name, source))?;
            if output.trim().is_empty() {
                continue;
            }

            manifest.push_str(&format!("---\n# Source: {}/templates/{}\n", chart.name(), name));
            manifest.push_str(&output);
            if !output.ends_with('\n') {
                manifest.push('\n');
            }
        }

        let crds = chart
            .crds()
            .map(|(path, data)| (path.to_string(), String::from_utf8_lossy(data).into_owned()))
            .collect();

        tracing::debug!(chart = chart.name(), version = %chart.version(), "rendered chart");
        Ok(Rendered { manifest, crds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn chart(templates: &[(&str, &str)]) -> Chart {
        let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        files.insert("Chart.yaml".into(), b"name: test\nversion: 0.1.0\n".to_vec());
        files.insert("values.yaml".into(), b"replicas: 1\nimage:\n  tag: '1.0'\n".to_vec());
        for (path, content) in templates {
            files.insert(path.to_string(), content.as_bytes().to_vec());
        }
        Chart::from_files("test", files).unwrap()
    }

    #[test]
    fn test_render_sorted_with_source_comments() {
        let chart = chart(&[
            ("templates/b.yaml", "b: {{ values.replicas }}\n"),
            ("templates/a.yaml", "a: {{ release.namespace }}"),
        ]);

        let rendered = TemplateRenderer::new()
            .render(&chart, &Values::new(), &ReleaseInfo::new("test", "apps"))
            .unwrap();

        assert_eq!(
            rendered.manifest,
            "---\n# Source: test/templates/a.yaml\na: apps\n---\n# Source: test/templates/b.yaml\nb: 1\n"
        );
    }

    #[test]
    fn test_values_override_chart_defaults() {
        let chart = chart(&[("templates/d.yaml", "replicas: {{ values.replicas }}\ntag: {{ values.image.tag | quote }}\n")]);
        let values = Values::from_yaml("replicas: 3\n").unwrap();

        let rendered = TemplateRenderer::new()
            .render(&chart, &values, &ReleaseInfo::new("test", "apps"))
            .unwrap();

        assert!(rendered.manifest.contains("replicas: 3\n"));
        assert!(rendered.manifest.contains("tag: \"1.0\"\n"));
    }

    #[test]
    fn test_helpers_notes_and_empty_skipped() {
        let chart = chart(&[
            ("templates/_helpers.tpl", "{% macro name() %}test-app{% endmacro %}"),
            ("templates/NOTES.txt", "thanks"),
            ("templates/empty.yaml", "{% if false %}x: 1{% endif %}\n"),
            (
                "templates/svc.yaml",
                "{% from '_helpers.tpl' import name %}name: {{ name() }}\n",
            ),
        ]);

        let rendered = TemplateRenderer::new()
            .render(&chart, &Values::new(), &ReleaseInfo::new("test", "apps"))
            .unwrap();

        assert_eq!(rendered.manifest, "---\n# Source: test/templates/svc.yaml\nname: test-app\n");
    }

    #[test]
    fn test_crds_returned_verbatim() {
        let chart = chart(&[
            ("crds/b.yaml", "kind: CustomResourceDefinition\nname: b\n"),
            ("crds/a.yaml", "kind: CustomResourceDefinition\nname: a\n"),
        ]);

        let rendered = TemplateRenderer::new()
            .render(&chart, &Values::new(), &ReleaseInfo::new("test", ""))
            .unwrap();

        let paths: Vec<_> = rendered.crds.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["crds/a.yaml", "crds/b.yaml"]);
        assert!(rendered.manifest.is_empty());
    }

    #[test]
    fn test_strict_undefined_fails() {
        let chart = chart(&[("templates/a.yaml", "a: {{ values.missing }}\n")]);

        let lenient = TemplateRenderer::new().render(&chart, &Values::new(), &ReleaseInfo::new("test", ""));
        assert!(lenient.is_ok());

        let strict = TemplateRenderer::new()
            .strict(true)
            .render(&chart, &Values::new(), &ReleaseInfo::new("test", ""));
        assert!(matches!(strict, Err(EngineError::Render(_))));
    }
}
