//! CLI error types with exit code handling
//!
//! Library errors are folded into a few categories, each with its own
//! exit code.

use miette::Diagnostic;
use simple_ops_core::CoreError;
use simple_ops_engine::EngineError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration could not be read or decoded
    #[error("Configuration error: {message}")]
    #[diagnostic(code(simple_ops::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A deployment chain failed
    #[error("Generation failed: {message}")]
    #[diagnostic(code(simple_ops::cli::generate))]
    Generate {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Generated output differs from what is committed
    #[error("{message}")]
    #[diagnostic(
        code(simple_ops::cli::drift),
        help("run `simple-ops generate` and commit the result")
    )]
    Drift { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(simple_ops::cli::io))]
    Io { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(simple_ops::cli::usage))]
    Usage { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Generate { .. } => exit_codes::GENERATE_ERROR,
            CliError::Drift { .. } => exit_codes::DRIFT,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn drift(message: impl Into<String>) -> Self {
        Self::Drift {
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            CoreError::NotEmpty { .. } => {
                CliError::config_with_help(err.to_string(), "use --force to initialize anyway")
            }
            CoreError::LockFileNotFound { .. } => {
                CliError::config_with_help(err.to_string(), "run `simple-ops init` to create one")
            }
            CoreError::InvalidDeployId { .. } => CliError::usage(err.to_string()),
            other => CliError::config(other.to_string()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(e) => e.into(),
            EngineError::Io(e) => e.into(),
            other => {
                let help = match other.root() {
                    EngineError::Kustomize { .. } => Some("is the `kustomize` binary on PATH?".to_string()),
                    EngineError::Jsonnet { .. } => Some("is the `jsonnet` binary on PATH?".to_string()),
                    EngineError::Render(e) => e.suggestion.clone(),
                    _ => None,
                };
                CliError::Generate {
                    message: other.to_string(),
                    help,
                }
            }
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
