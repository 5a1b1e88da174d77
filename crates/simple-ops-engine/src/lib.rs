//! simple-ops Engine - manifest generation for GitOps workspaces
//!
//! This crate turns resolved deployments into the `deploy/` tree:
//! - Chart loading and client-side rendering (MiniJinja)
//! - `with` templates, namespace and label rewriting
//! - Kustomize overlays and Jsonnet programs through pluggable collaborators
//! - Staged generation with all-or-nothing promotion and drift verification
//! - Read-only queries: container images, container resources, chart contents

pub mod actions;
pub mod chart;
pub mod documents;
pub mod error;
pub mod executor;
pub mod filters;
pub mod generator;
pub mod inspect;
pub mod jsonnet;
pub mod kustomize;
pub mod render;
pub mod staging;

pub use chart::{Chart, ChartMetadata};
pub use error::{EngineError, Result, TemplateError};
pub use executor::{ChainExecutor, Tools};
pub use generator::{DriftReport, Generator};
pub use inspect::{ChartPart, ContainerResources};
pub use jsonnet::{JsonnetCli, JsonnetEvaluator};
pub use kustomize::{KustomizeCli, OverlayApplier};
pub use render::{ChartRenderer, ReleaseInfo, Rendered, TemplateRenderer};
