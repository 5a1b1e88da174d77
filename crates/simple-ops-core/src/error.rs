//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("Invalid configuration in {path}: {message}")]
    InvalidConfig { path: String, message: String },

    #[error("deploy {environment}.{component} not found")]
    DeployNotFound {
        environment: String,
        component: String,
    },

    #[error("Invalid deploy id '{id}', expected <environment>.<component>")]
    InvalidDeployId { id: String },

    #[error("Invalid set path '{path}': {message}")]
    InvalidSetPath { path: String, message: String },

    #[error("Unknown action '{name}'")]
    UnknownAction { name: String },

    #[error("Lock file not found: {path}")]
    LockFileNotFound { path: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("path {path} not empty")]
    NotEmpty { path: String },
}

impl CoreError {
    /// Attach the offending file to a YAML error
    pub fn config(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
