//! CLI error types with exit code handling
//!
//! Every failure from the libraries is converted into [`CliError`] so that
//! `main` can notify, render and exit in one place.

use helmsync_core::{CoreError, ValidationError};
use helmsync_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// The desired state failed validation
    #[error("Validation failed: {message}")]
    #[diagnostic(code(helmsync::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The state file could not be loaded
    #[error("Failed to load state: {message}")]
    #[diagnostic(code(helmsync::cli::load))]
    Load {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A cluster-facing stage failed
    #[error("Cluster error: {message}")]
    #[diagnostic(code(helmsync::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(helmsync::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Load { .. } => exit_codes::LOAD_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        let help = match &err {
            ValidationError::Certificates(_) => Some(
                "certificate paths are resolved relative to the state file; bucket URIs must use s3://, gs:// or az://"
                    .to_string(),
            ),
            ValidationError::Namespaces(_) => {
                Some("declare at least one namespace or pass --ns-override".to_string())
            }
            _ => None,
        };
        CliError::Validation {
            message: err.to_string(),
            help,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(err) => err.into(),
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            CoreError::UnsupportedFormat { .. } => CliError::Load {
                message: err.to_string(),
                help: Some("use a .yaml, .yml or .toml file".to_string()),
            },
            CoreError::Parameter { .. } => CliError::Load {
                message: err.to_string(),
                help: Some("pass --no-ssm-subst to skip SSM parameter substitution".to_string()),
            },
            other => CliError::Load {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let help = match &err {
            KubeError::Spawn { program, .. } => Some(format!("is {program} installed and on PATH?")),
            KubeError::ContextNotFound(_) => {
                Some("set settings.clusterURI to create the context".to_string())
            }
            _ => None,
        };
        CliError::Cluster {
            message: err.to_string(),
            help,
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

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
