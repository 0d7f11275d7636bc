//! CLI commands

pub mod reconcile;
pub mod show;
pub mod validate;

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use helmsync_core::{
    AwsCliParameterStore, DesiredState, LoadOptions, LoadedState, SubstitutionConfig, Substitutor,
    ValidateOptions,
};
use helmsync_kube::{Kubectl, ProcessExecutor, SessionOptions};

use crate::error::Result;

/// Arguments shared by every command that reads a state file
#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    /// Desired state file (.yaml, .yml or .toml)
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Do not substitute environment variables in the state file
    #[arg(long)]
    pub no_env_subst: bool,

    /// Do not substitute SSM parameters in the state file
    #[arg(long)]
    pub no_ssm_subst: bool,

    /// Do not substitute environment variables in values files
    #[arg(long)]
    pub no_env_values_subst: bool,

    /// Do not substitute SSM parameters in values files
    #[arg(long)]
    pub no_ssm_values_subst: bool,

    /// Deploy every app into this namespace, ignoring declared namespaces
    #[arg(long)]
    pub ns_override: Option<String>,

    /// Do not add the default 'stable' and 'incubator' repositories
    #[arg(long)]
    pub no_default_repos: bool,

    /// kubectl binary to use
    #[arg(long, env = "HELMSYNC_KUBECTL", default_value = "kubectl")]
    pub kubectl: String,

    /// Directory for fetched certificates and transient manifests
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

impl StateArgs {
    pub fn substitution(&self) -> SubstitutionConfig {
        SubstitutionConfig {
            env: !self.no_env_subst,
            ssm: !self.no_ssm_subst,
            env_values: !self.no_env_values_subst,
            ssm_values: !self.no_ssm_values_subst,
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            default_repos: !self.no_default_repos,
            ..Default::default()
        }
    }

    /// kubectl on the local machine, for commands that run without a session
    pub fn local_kubectl(&self) -> Kubectl {
        Kubectl::new(Arc::new(ProcessExecutor::new()), self.kubectl.clone())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            kubectl: self.kubectl.clone(),
            work_dir: self.work_dir.clone(),
            ns_override: self.ns_override.clone(),
        }
    }
}

/// What the termination path needs to know about the run so far
#[derive(Debug, Default)]
pub struct RunContext {
    /// Webhook for failure notifications, once the state is loaded
    pub webhook: Option<String>,
}

/// Load the state file named by `args` and record its webhook
pub fn load_state(args: &StateArgs, ctx: &mut RunContext) -> Result<LoadedState> {
    let params = AwsCliParameterStore::default();
    let subst = Substitutor::new(args.substitution(), &params);
    let loaded = LoadedState::load(&args.file, &subst, &args.load_options())?;

    let webhook = &loaded.state.settings.slack_webhook;
    if !webhook.is_empty() {
        ctx.webhook = Some(webhook.clone());
    }
    Ok(loaded)
}

/// Validation options for `state`. `kubectl` is only asked for its current
/// context when the document names none and cannot create one.
pub async fn validate_options(
    args: &StateArgs,
    state: &DesiredState,
    kubectl: &Kubectl,
) -> ValidateOptions {
    let settings = &state.settings;
    let active_context = if settings.kube_context.is_empty() && settings.cluster_uri.is_empty() {
        match kubectl.current_context().await {
            Ok(context) => context.is_some(),
            Err(e) => {
                tracing::debug!("could not query the current kube context: {}", e);
                false
            }
        }
    } else {
        false
    };

    ValidateOptions {
        ns_override: args.ns_override.clone(),
        active_context,
    }
}
