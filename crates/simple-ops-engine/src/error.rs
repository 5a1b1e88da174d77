//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use simple_ops_core::CoreError;
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A chain step failed; the whole run is aborted
    #[error("deploy {deploy}: action '{action}' failed: {source}")]
    Chain {
        deploy: String,
        action: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Chart {chart}: {message}")]
    Chart { chart: String, message: String },

    #[error("Chart {chart}: dependencies not installed ({installed} of {declared} present)")]
    ChartDependencies {
        chart: String,
        declared: usize,
        installed: usize,
    },

    #[error("with template '{group}': {message}")]
    WithTemplate { group: String, message: String },

    #[error("path cannot be outside working directory: {path}")]
    PathEscape { path: String },

    #[error("with template path duplicate: {path}")]
    DuplicatePath { path: String },

    #[error("Template error: {0}")]
    Render(#[from] TemplateError),

    #[error("kustomize failed: {message}")]
    Kustomize { message: String },

    #[error("jsonnet program '{name}' failed: {message}")]
    Jsonnet { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Innermost error of a chain failure
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Chain { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(simple_ops::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Template source code
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// Suggestion for fixing the error
    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a new template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let span = err
            .line()
            .and_then(|line_num| calculate_span(template_source, line_num));
        let message = match err.detail() {
            Some(detail) => format!("{}: {} ({})", template_name, err.kind(), detail),
            None => format!("{}: {}", template_name, err.kind()),
        };

        Self {
            suggestion: suggest(&err),
            message,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
        }
    }

    /// Create a simple error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }
}

fn suggest(err: &minijinja::Error) -> Option<String> {
    match err.kind() {
        minijinja::ErrorKind::UndefinedError => Some(
            "chart values are available as `values`, release data as `release` and chart metadata as `chart`"
                .to_string(),
        ),
        minijinja::ErrorKind::UnknownFilter => Some(
            "available filters: toyaml, tojson, b64encode, b64decode, quote, indent, nindent, required".to_string(),
        ),
        _ => None,
    }
}

/// Calculate the source span for a given line number
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (idx, line) in source.lines().enumerate() {
        if idx + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_span() {
        let span = calculate_span("a: 1\nbb: 2\n", 2).unwrap();
        assert_eq!(span.offset(), 5);
        assert_eq!(span.len(), 5);
        assert!(calculate_span("a: 1\n", 4).is_none());
    }

    #[test]
    fn test_chain_root() {
        let err = EngineError::Chain {
            deploy: "prod.app".to_string(),
            action: "with".to_string(),
            source: Box::new(EngineError::PathEscape {
                path: "../x".to_string(),
            }),
        };

        assert!(matches!(err.root(), EngineError::PathEscape { .. }));
        assert!(err.to_string().contains("deploy prod.app: action 'with' failed"));
    }
}
