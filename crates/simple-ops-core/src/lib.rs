//! simple-ops Core - configuration model for GitOps manifest generation
//!
//! This crate provides the foundational types used throughout simple-ops:
//! - `Values`: Untyped configuration trees with deep merge and dotted-path set
//! - `Deployment`: One resolved (component, environment) record
//! - `ConfigStore`: Layered configuration discovery and expansion
//! - `LockStore`: Chart provenance ledger
//! - `digest`: SHA-256 over files and directory trees

pub mod archive;
pub mod config;
pub mod deploy;
pub mod digest;
pub mod error;
pub mod lock;
pub mod values;

pub use config::{ConfigStore, Workspace};
pub use deploy::{Action, Deployment, JsonnetProgram, Namespace, WithInstance, default_chain, parse_deploy_id};
pub use error::{CoreError, Result};
pub use lock::{ChartReport, ChartSource, DigestMismatch, LockFile, LockStore};
pub use values::{Values, merge_maps, merge_values};
