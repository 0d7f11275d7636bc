//! Desired-state validation
//!
//! Runs once after loading and before any cluster action. Sections are
//! checked in a fixed order and the first failure is returned:
//! settings, notifications, certificates, namespaces, repositories, apps.

use std::collections::HashSet;
use std::path::Path;

use crate::error::ValidationError;
use crate::location::{Location, is_request_uri};
use crate::state::{App, CA_CRT, CA_KEY, Certificates, DesiredState, Settings};

const VALUES_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Run-scoped inputs to validation that do not live in the document
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Collapse every app into this namespace
    pub ns_override: Option<String>,

    /// An active cluster context already exists, so the document may omit
    /// `kubeContext`
    pub active_context: bool,
}

/// Successful validation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// The document is valid and has apps to manage
    Valid,
    /// The document is valid but declares no apps; the run ends here
    NoApps,
}

/// Validate a desired state.
///
/// Certificate entries are normalised in place. Nothing else is modified.
pub fn validate(
    state: &mut DesiredState,
    options: &ValidateOptions,
) -> Result<Validation, ValidationError> {
    validate_settings(&state.settings, options.active_context)?;
    validate_notifications(&state.settings)?;
    validate_certificates(&mut state.certificates, &state.settings)?;
    validate_namespaces(state, options)?;
    validate_repos(state)?;

    if state.apps.is_empty() {
        tracing::info!("no apps specified, nothing to be executed");
        return Ok(Validation::NoApps);
    }

    let mut names = HashSet::new();
    for (label, app) in &state.apps {
        validate_app(app, state, options, &mut names).map_err(|message| ValidationError::App {
            label: label.clone(),
            message,
        })?;
    }

    Ok(Validation::Valid)
}

/// Check cluster identity and credential settings
pub fn validate_settings(settings: &Settings, active_context: bool) -> Result<(), ValidationError> {
    let fail = |msg: &str| Err(ValidationError::Settings(msg.to_string()));

    if settings.kube_context.is_empty() && !active_context {
        return fail(
            "you have not defined a kubeContext to use. Either define it in the desired state \
             file or use an existing context.",
        );
    }

    if !settings.cluster_uri.is_empty() {
        if !is_request_uri(&settings.cluster_uri) {
            return fail(
                "clusterURI must have a valid URL set in an env variable or passed directly. \
                 Either the env var is missing/empty or the URL is invalid.",
            );
        }
        if settings.kube_context.is_empty() {
            return fail("kubeContext needs to be provided in the settings stanza.");
        }
        if !settings.bearer_token && settings.username.is_empty() {
            return fail("username needs to be provided in the settings stanza.");
        }
        if !settings.bearer_token && settings.password.is_empty() {
            return fail(
                "password needs to be provided (directly or from env var) in the settings stanza.",
            );
        }
        if settings.bearer_token
            && !settings.bearer_token_path.is_empty()
            && !Path::new(&settings.bearer_token_path).exists()
        {
            return Err(ValidationError::Settings(format!(
                "bearer token path {} is not found. The path has to be relative to the desired \
                 state file.",
                settings.bearer_token_path
            )));
        }
    } else if settings.bearer_token {
        return fail("bearer token is enabled but no cluster URI provided.");
    }

    Ok(())
}

fn validate_notifications(settings: &Settings) -> Result<(), ValidationError> {
    if !settings.slack_webhook.is_empty() && !is_request_uri(&settings.slack_webhook) {
        return Err(ValidationError::Settings(
            "slackWebhook must be a valid URL.".to_string(),
        ));
    }
    Ok(())
}

/// Check every certificate entry and the per-credential-mode requirements
pub fn validate_certificates(
    certificates: &mut Certificates,
    settings: &Settings,
) -> Result<(), ValidationError> {
    if certificates.is_empty() {
        if !settings.cluster_uri.is_empty() {
            return Err(ValidationError::Certificates(
                "kube context setup is required but no certificates stanza provided.".to_string(),
            ));
        }
        return Ok(());
    }

    for (key, value) in certificates.iter_mut() {
        match Location::resolve_existing(value) {
            Some(location) => *value = location.to_string(),
            None => {
                return Err(ValidationError::Certificates(format!(
                    "[ {key} ] must be a valid S3, GCS, AZ bucket/container URL or a valid \
                     relative file path."
                )));
            }
        }
    }

    if settings.cluster_uri.is_empty() {
        return Ok(());
    }

    let has_crt = certificates.contains_key(CA_CRT);
    let has_key = certificates.contains_key(CA_KEY);
    if !settings.bearer_token && (!has_crt || !has_key) {
        return Err(ValidationError::Certificates(
            "connecting to the cluster requires [caCrt] and [caKey] under certificates. \
             You might also need to provide [caClient]."
                .to_string(),
        ));
    }
    if settings.bearer_token && !has_crt {
        return Err(ValidationError::Certificates(
            "cluster connection with bearer token is enabled but [caCrt] is missing. Please \
             provide [caCrt] in the certificates stanza."
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_namespaces(
    state: &DesiredState,
    options: &ValidateOptions,
) -> Result<(), ValidationError> {
    if let Some(ns) = &options.ns_override {
        tracing::info!(
            "ns-override is used to override all namespaces with [ {ns} ]. Skipping defined \
             namespaces validation."
        );
        return Ok(());
    }
    if state.namespaces.is_empty() {
        return Err(ValidationError::Namespaces(
            "at least one namespace is required.".to_string(),
        ));
    }
    Ok(())
}

fn validate_repos(state: &DesiredState) -> Result<(), ValidationError> {
    for (name, url) in &state.helm_repos {
        if !is_request_uri(url) {
            return Err(ValidationError::Repos(format!(
                "repo [ {name} ] must have a valid URL."
            )));
        }
    }
    Ok(())
}

/// Checks a single app. `names` collects `(namespace, name)` pairs seen so
/// far to enforce uniqueness.
fn validate_app(
    app: &App,
    state: &DesiredState,
    options: &ValidateOptions,
    names: &mut HashSet<(String, String)>,
) -> Result<(), String> {
    let namespace = match &options.ns_override {
        Some(ns) => ns.as_str(),
        None => {
            if app.namespace.is_empty() {
                return Err("release targeted namespace can't be empty.".to_string());
            }
            if !state.namespace_defined(&app.namespace) {
                return Err(format!(
                    "release {} is using namespace [ {} ] which is not defined in the \
                     namespaces section of your desired state file.",
                    app.name, app.namespace
                ));
            }
            app.namespace.as_str()
        }
    };

    validate_chart(app, state)?;

    check_files(&app.values_file, &app.values_files, "valuesFile")?;
    check_files(&app.secrets_file, &app.secrets_files, "secretsFile")?;

    if app.priority > 0 {
        return Err(
            "priority can only be 0 or negative value, positive values are not allowed."
                .to_string(),
        );
    }

    if !names.insert((namespace.to_string(), app.name.clone())) {
        return Err(format!(
            "release name [ {} ] must be unique within a given namespace [ {} ].",
            app.name, namespace
        ));
    }

    Ok(())
}

fn validate_chart(app: &App, state: &DesiredState) -> Result<(), String> {
    if app.chart.is_empty() {
        return Err("chart can't be empty.".to_string());
    }
    if let Some(repo) = state.chart_repository(&app.chart) {
        if app.version.is_empty() {
            return Err(format!(
                "version can't be empty for chart [ {} ] from repository [ {} ].",
                app.chart, repo
            ));
        }
        return Ok(());
    }
    if !Path::new(&app.chart).is_dir() {
        return Err(format!(
            "chart [ {} ] is neither a local chart directory nor in a declared repository.",
            app.chart
        ));
    }
    Ok(())
}

fn check_files(single: &str, list: &[String], field: &str) -> Result<(), String> {
    if !single.is_empty() && !list.is_empty() {
        return Err(format!("{field} and {field}s should not be used together."));
    }
    if !single.is_empty() && !is_values_file(single) {
        return Err(format!(
            "{field} must be a valid relative (from the desired state file) path to a yaml \
             file, or can be left empty (provided path resolved to {single:?})."
        ));
    }
    for (i, path) in list.iter().enumerate() {
        if !is_values_file(path) {
            return Err(format!(
                "{field}s must be valid relative (from the desired state file) paths to yaml \
                 files; path at index {i} resolved to {path:?}."
            ));
        }
    }
    Ok(())
}

fn is_values_file(path: &str) -> bool {
    let path = Path::new(path);
    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| VALUES_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    has_ext && path.is_file()
}
