//! Error types for helmsync-kube

use thiserror::Error;

use crate::context::BootstrapStage;

/// Result type for helmsync-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while talking to the cluster and its collaborators
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// The external program could not be started at all
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran and exited non-zero
    #[error("{description} failed (exit code {code}): {stderr}")]
    CommandFailed {
        description: String,
        code: i32,
        stderr: String,
    },

    /// Creating or selecting the kube context failed
    #[error("failed to create context [ {context} ] at stage {stage}: {message}")]
    ContextSetup {
        context: String,
        stage: BootstrapStage,
        message: String,
    },

    /// A configured context could not be selected
    #[error("kube context [ {0} ] does not exist and no cluster URI is configured to create it")]
    ContextNotFound(String),

    /// Namespace provisioning failed
    #[error("failed to reconcile namespace [ {namespace} ]: {message}")]
    Namespace { namespace: String, message: String },

    /// Applying a LimitRange failed
    #[error("failed to create LimitRange in namespace [ {namespace} ]: {message}")]
    LimitRange { namespace: String, message: String },

    /// Listing release storage objects failed
    #[error("failed to list managed releases in namespace [ {namespace} ]: {message}")]
    Ownership { namespace: String, message: String },

    /// Downloading a certificate, key or token failed
    #[error("failed to fetch {location}: {message}")]
    Fetch { location: String, message: String },

    /// Posting a notification failed
    #[error("notification failed: {0}")]
    Notification(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for KubeError {
    fn from(e: reqwest::Error) -> Self {
        KubeError::Notification(e.to_string())
    }
}
