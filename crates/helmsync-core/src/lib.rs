//! helmsync core - desired-state model and the text-to-model pipeline
//!
//! This crate provides everything that happens before the cluster is touched:
//! - `DesiredState`: the declared namespaces, settings, repositories and apps
//! - `Substitutor`: environment and remote-parameter substitution
//! - `paths`: resolution of state-file-relative references
//! - `LoadedState`: YAML/TOML loading with a run-scoped scratch directory
//! - `validate`: ordered, short-circuiting validation

pub mod error;
pub mod loader;
pub mod location;
pub mod paths;
pub mod state;
pub mod subst;
pub mod validate;

pub use error::{CoreError, Result, ValidationError};
pub use loader::{LoadOptions, LoadedState, StateFormat};
pub use location::{BucketObject, BucketScheme, Location, is_request_uri};
pub use state::{
    App, CA_CLIENT, CA_CRT, CA_KEY, Certificates, DesiredState, LimitRule, Namespace, Resources,
    Settings,
};
pub use subst::{AwsCliParameterStore, ParameterStore, SubstitutionConfig, Substitutor};
pub use validate::{Validation, ValidateOptions, validate};
