//! Jsonnet programs
//!
//! Evaluation goes through [`JsonnetEvaluator`]; [`JsonnetCli`] shells out
//! to the `jsonnet` binary. Output JSON is converted to YAML here.

use serde_json::Value as JsonValue;
use simple_ops_core::JsonnetProgram;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{EngineError, Result};

/// Evaluates Jsonnet to JSON text
pub trait JsonnetEvaluator {
    fn eval_snippet(
        &self,
        name: &str,
        code: &str,
        ext_vars: &BTreeMap<String, String>,
        jpaths: &[PathBuf],
    ) -> Result<String>;

    fn eval_file(&self, path: &Path, ext_vars: &BTreeMap<String, String>, jpaths: &[PathBuf]) -> Result<String>;
}

/// Runs the `jsonnet` binary
#[derive(Debug, Clone)]
pub struct JsonnetCli {
    binary: PathBuf,
}

impl Default for JsonnetCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("jsonnet"),
        }
    }
}

impl JsonnetCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    fn command(&self, ext_vars: &BTreeMap<String, String>, jpaths: &[PathBuf]) -> Command {
        let mut cmd = Command::new(&self.binary);
        for jpath in jpaths {
            cmd.arg("-J").arg(jpath);
        }
        for (k, v) in ext_vars {
            cmd.arg("--ext-str").arg(format!("{}={}", k, v));
        }
        cmd
    }

    fn run(&self, name: &str, mut cmd: Command) -> Result<String> {
        let output = cmd.output().map_err(|e| EngineError::Jsonnet {
            name: name.to_string(),
            message: format!("could not run {}: {}", self.binary.display(), e),
        })?;
        if !output.status.success() {
            return Err(EngineError::Jsonnet {
                name: name.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl JsonnetEvaluator for JsonnetCli {
    fn eval_snippet(
        &self,
        name: &str,
        code: &str,
        ext_vars: &BTreeMap<String, String>,
        jpaths: &[PathBuf],
    ) -> Result<String> {
        let mut cmd = self.command(ext_vars, jpaths);
        cmd.arg("-e").arg(code);
        self.run(name, cmd)
    }

    fn eval_file(&self, path: &Path, ext_vars: &BTreeMap<String, String>, jpaths: &[PathBuf]) -> Result<String> {
        let mut cmd = self.command(ext_vars, jpaths);
        cmd.arg(path);
        self.run(&path.display().to_string(), cmd)
    }
}

/// Evaluate one configured program to YAML
///
/// File output comes before inline output. A `multi` file must evaluate to
/// an object; each key becomes a document, in key order, and every document
/// after the first gets its own `# Source:` header.
pub fn evaluate(evaluator: &dyn JsonnetEvaluator, root: &Path, name: &str, program: &JsonnetProgram) -> Result<String> {
    let mut jpaths = vec![root.to_path_buf()];
    let mut out = String::new();

    if !program.path.is_empty() {
        let file = root.join(&program.path);
        if let Some(dir) = Path::new(&program.path).parent() {
            jpaths.push(root.join(dir).join("vendor"));
        }
        let json = evaluator
            .eval_file(&file, &program.values, &jpaths)
            .map_err(|e| rename(e, name))?;

        if program.multi {
            out.push_str(&multi_to_yaml(name, &json)?);
        } else {
            out.push_str(&json_to_yaml(name, &json)?);
        }
    }

    if !program.inline.is_empty() {
        let json = evaluator
            .eval_snippet(name, &program.inline, &program.values, &jpaths)
            .map_err(|e| rename(e, name))?;
        if !out.is_empty() {
            out.push_str("---\n");
        }
        out.push_str(&json_to_yaml(name, &json)?);
    }

    Ok(out)
}

fn rename(err: EngineError, name: &str) -> EngineError {
    match err {
        EngineError::Jsonnet { message, .. } => EngineError::Jsonnet {
            name: name.to_string(),
            message,
        },
        other => other,
    }
}

fn parse_json(name: &str, json: &str) -> Result<JsonValue> {
    serde_json::from_str(json).map_err(|e| EngineError::Jsonnet {
        name: name.to_string(),
        message: format!("output is not JSON: {}", e),
    })
}

/// Convert JSON text to a YAML document
pub fn json_to_yaml(name: &str, json: &str) -> Result<String> {
    Ok(serde_yaml::to_string(&parse_json(name, json)?)?)
}

fn multi_to_yaml(name: &str, json: &str) -> Result<String> {
    let JsonValue::Object(documents) = parse_json(name, json)? else {
        return Err(EngineError::Jsonnet {
            name: name.to_string(),
            message: "multi-document output must be an object".to_string(),
        });
    };

    let mut out = String::new();
    for (i, (key, doc)) in documents.iter().enumerate() {
        if i > 0 {
            out.push_str(&format!("---\n# Source: simple-ops jsonnet {}\n", key));
        }
        out.push_str(&serde_yaml::to_string(doc)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Returns canned JSON and records what it was asked to evaluate
    #[derive(Default)]
    struct Canned {
        file: String,
        snippet: String,
        calls: RefCell<Vec<String>>,
    }

    impl JsonnetEvaluator for Canned {
        fn eval_snippet(
            &self,
            name: &str,
            _code: &str,
            _ext_vars: &BTreeMap<String, String>,
            _jpaths: &[PathBuf],
        ) -> Result<String> {
            self.calls.borrow_mut().push(format!("snippet {}", name));
            Ok(self.snippet.clone())
        }

        fn eval_file(&self, path: &Path, _ext_vars: &BTreeMap<String, String>, jpaths: &[PathBuf]) -> Result<String> {
            self.calls
                .borrow_mut()
                .push(format!("file {} {}", path.display(), jpaths.len()));
            Ok(self.file.clone())
        }
    }

    #[test]
    fn test_inline() {
        let eval = Canned {
            snippet: "[1]".to_string(),
            ..Default::default()
        };
        let program = JsonnetProgram {
            inline: "local a = 1; [a]".to_string(),
            ..Default::default()
        };

        let out = evaluate(&eval, Path::new("/ws"), "test", &program).unwrap();

        assert_eq!(out, "- 1\n");
        assert_eq!(*eval.calls.borrow(), vec!["snippet test"]);
    }

    #[test]
    fn test_multi_file_sorted_by_key() {
        let eval = Canned {
            file: r#"{"b": [2], "a": [1]}"#.to_string(),
            ..Default::default()
        };
        let program = JsonnetProgram {
            path: "jsonnet/test.jsonnet".to_string(),
            multi: true,
            ..Default::default()
        };

        let out = evaluate(&eval, Path::new("/ws"), "test", &program).unwrap();

        assert_eq!(out, "- 1\n---\n# Source: simple-ops jsonnet b\n- 2\n");
        assert_eq!(*eval.calls.borrow(), vec!["file /ws/jsonnet/test.jsonnet 2"]);
    }

    #[test]
    fn test_file_precedes_inline() {
        let eval = Canned {
            file: r#"{"kind": "A"}"#.to_string(),
            snippet: r#"{"kind": "B"}"#.to_string(),
            ..Default::default()
        };
        let program = JsonnetProgram {
            path: "p.jsonnet".to_string(),
            inline: "{}".to_string(),
            ..Default::default()
        };

        let out = evaluate(&eval, Path::new("/ws"), "test", &program).unwrap();

        assert_eq!(out, "kind: A\n---\nkind: B\n");
    }

    #[test]
    fn test_multi_requires_object() {
        let eval = Canned {
            file: "[1]".to_string(),
            ..Default::default()
        };
        let program = JsonnetProgram {
            path: "p.jsonnet".to_string(),
            multi: true,
            ..Default::default()
        };

        let err = evaluate(&eval, Path::new("/ws"), "test", &program).unwrap_err();
        assert!(matches!(err, EngineError::Jsonnet { .. }));
    }
}
