//! Desired-state file loading
//!
//! Loading runs the whole text-to-model pipeline: variable substitution on the
//! raw document, strict decoding (YAML or TOML, chosen by extension), default
//! repositories, path resolution, and substitution inside referenced values
//! files.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{CoreError, Result};
use crate::paths::{resolve_paths, rewrite_value_files};
use crate::state::DesiredState;
use crate::subst::Substitutor;

/// URL of the default `stable` repository
pub const STABLE_REPO_URL: &str = "https://charts.helm.sh/stable";
/// URL of the default `incubator` repository
pub const INCUBATOR_REPO_URL: &str = "https://charts.helm.sh/incubator";

/// Serialization of a state file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFormat {
    Yaml,
    Toml,
}

impl StateFormat {
    /// Detect the format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(StateFormat::Yaml),
            "toml" => Some(StateFormat::Toml),
            _ => None,
        }
    }

    /// Strictly decode a document; unknown fields are errors
    pub fn parse(self, content: &str) -> Result<DesiredState> {
        match self {
            StateFormat::Yaml => Ok(serde_yaml::from_str(content)?),
            StateFormat::Toml => Ok(toml::from_str(content)?),
        }
    }
}

/// Options controlling how a state file is loaded
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Add the `stable` and `incubator` repositories when missing
    pub default_repos: bool,

    /// Parent directory for the scratch directory (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            default_repos: true,
            temp_dir: None,
        }
    }
}

/// A fully resolved desired state.
///
/// Owns the scratch directory holding substituted values files; it is
/// removed when this value is dropped.
#[derive(Debug)]
pub struct LoadedState {
    pub state: DesiredState,
    pub source: PathBuf,
    scratch: TempDir,
}

impl LoadedState {
    /// Load and resolve a state file
    pub fn load(path: &Path, subst: &Substitutor<'_>, options: &LoadOptions) -> Result<Self> {
        let format = StateFormat::from_path(path).ok_or_else(|| CoreError::UnsupportedFormat {
            path: path.display().to_string(),
        })?;

        let raw = fs::read_to_string(path).map_err(|e| CoreError::ReadState {
            path: path.display().to_string(),
            source: e,
        })?;

        tracing::debug!(file = %path.display(), "substituting variables in state file");
        let content = subst.substitute_document(&raw)?;

        let mut state = format.parse(&content)?;
        default_app_names(&mut state);
        if options.default_repos {
            add_default_repos(&mut state);
        } else {
            tracing::info!("default repositories disabled, 'stable' and 'incubator' are not added");
        }

        let scratch = match &options.temp_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                tempfile::Builder::new().prefix("helmsync-").tempdir_in(dir)?
            }
            None => tempfile::Builder::new().prefix("helmsync-").tempdir()?,
        };

        resolve_paths(&mut state, path, subst);
        rewrite_value_files(&mut state, subst, scratch.path())?;

        tracing::info!(
            "parsed [[ {} ]] successfully and found [ {} ] apps",
            path.display(),
            state.apps.len()
        );

        Ok(Self {
            state,
            source: path.to_path_buf(),
            scratch,
        })
    }

    /// Directory holding the substituted values files
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

/// Apps without an explicit `name` are released under their label
fn default_app_names(state: &mut DesiredState) {
    for (label, app) in state.apps.iter_mut() {
        if app.name.is_empty() {
            app.name = label.clone();
        }
    }
}

fn add_default_repos(state: &mut DesiredState) {
    if state.helm_repos.is_empty() {
        tracing::info!("no repositories provided, using the default 'stable' and 'incubator' repositories");
    }
    state
        .helm_repos
        .entry("stable".to_string())
        .or_insert_with(|| STABLE_REPO_URL.to_string());
    state
        .helm_repos
        .entry("incubator".to_string())
        .or_insert_with(|| INCUBATOR_REPO_URL.to_string());
}
