//! Desired-state document model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Key of the CA certificate in the certificates stanza
pub const CA_CRT: &str = "caCrt";
/// Key of the CA (client) key in the certificates stanza
pub const CA_KEY: &str = "caKey";
/// Key of the client certificate in the certificates stanza
pub const CA_CLIENT: &str = "caClient";

/// Certificate key name -> local path or bucket URI
pub type Certificates = BTreeMap<String, String>;

/// The desired state of namespaces, settings and applications on a cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DesiredState {
    /// Free-form metadata, informational only
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub certificates: Certificates,

    #[serde(default)]
    pub settings: Settings,

    /// Namespace name -> namespace definition
    #[serde(default)]
    pub namespaces: BTreeMap<String, Namespace>,

    /// Repository name -> repository URL
    #[serde(default)]
    pub helm_repos: BTreeMap<String, String>,

    /// Repositories already registered with the deployment tool
    #[serde(default)]
    pub preconfigured_helm_repos: Vec<String>,

    /// App label -> app definition
    #[serde(default)]
    pub apps: BTreeMap<String, App>,
}

impl DesiredState {
    /// Whether `name` is a declared or pre-registered repository
    pub fn is_repo(&self, name: &str) -> bool {
        self.helm_repos.contains_key(name)
            || self
                .preconfigured_helm_repos
                .iter()
                .any(|r| r.trim() == name)
    }

    /// Repository name of a repository-qualified chart reference (`repo/chart`).
    ///
    /// A local chart directory whose parent happens to be named like a
    /// repository is reported as repository-qualified.
    pub fn chart_repository<'c>(&self, chart: &'c str) -> Option<&'c str> {
        let dir = Path::new(chart).parent()?.to_str()?;
        self.is_repo(dir).then_some(dir)
    }

    /// Whether a namespace is declared in the namespaces stanza
    pub fn namespace_defined(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// Storage backend kind holding release state, `secret` unless configured
    pub fn storage_backend(&self) -> &str {
        if self.settings.storage_backend.is_empty() {
            "secret"
        } else {
            &self.settings.storage_backend
        }
    }
}

/// Cluster access and run settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub kube_context: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default, rename = "clusterURI")]
    pub cluster_uri: String,

    #[serde(default)]
    pub service_account: String,

    #[serde(default)]
    pub storage_backend: String,

    #[serde(default)]
    pub slack_webhook: String,

    /// Delete apps in reverse priority order
    #[serde(default)]
    pub reverse_delete: bool,

    /// Authenticate with a bearer token instead of username/password
    #[serde(default)]
    pub bearer_token: bool,

    #[serde(default)]
    pub bearer_token_path: String,

    #[serde(default)]
    pub eyaml_enabled: bool,

    #[serde(default)]
    pub eyaml_private_key_path: String,

    #[serde(default)]
    pub eyaml_public_key_path: String,
}

impl Settings {
    /// True when every field is at its zero value
    pub fn is_empty(&self) -> bool {
        *self == Settings::default()
    }
}

/// A namespace to provision on the cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Namespace {
    /// Blocks destructive operations on apps in this namespace
    #[serde(default)]
    pub protected: bool,

    #[serde(default)]
    pub limits: Vec<LimitRule>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// One entry of a LimitRange `spec.limits` list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LimitRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Resources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Resources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Resources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_request: Option<Resources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_limit_request_ratio: Option<Resources>,

    /// Scope of the rule (`Container`, `Pod`, ...)
    #[serde(rename = "type")]
    pub limit_type: String,
}

/// CPU and memory quantities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// An application (release) entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct App {
    /// Release name, defaults to the app label
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub enabled: bool,

    /// `repo/chart` or a path to a local chart directory
    #[serde(default)]
    pub chart: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub values_file: String,

    #[serde(default)]
    pub values_files: Vec<String>,

    #[serde(default)]
    pub secrets_file: String,

    #[serde(default)]
    pub secrets_files: Vec<String>,

    #[serde(default)]
    pub purge: bool,

    #[serde(default)]
    pub test: bool,

    #[serde(default)]
    pub protected: bool,

    #[serde(default)]
    pub wait: bool,

    /// Ordering hint, zero or negative
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub set: BTreeMap<String, String>,

    #[serde(default)]
    pub set_string: BTreeMap<String, String>,

    #[serde(default)]
    pub helm_flags: Vec<String>,

    #[serde(default)]
    pub no_hooks: bool,

    /// Seconds
    #[serde(default)]
    pub timeout: u32,
}
