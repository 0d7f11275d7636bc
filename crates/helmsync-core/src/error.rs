//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to read state file {path}: {source}")]
    ReadState {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {path} does not have a toml/yaml extension")]
    UnsupportedFormat { path: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read parameter {name}: {message}")]
    Parameter { name: String, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A desired-state validation failure, grouped by the section that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("settings validation failed -- {0}")]
    Settings(String),

    #[error("certificates validation failed -- {0}")]
    Certificates(String),

    #[error("namespaces validation failed -- {0}")]
    Namespaces(String),

    #[error("repos validation failed -- {0}")]
    Repos(String),

    #[error("apps validation failed -- for app [ {label} ]. {message}")]
    App { label: String, message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
