//! Typed kubectl invocations
//!
//! Every argument vector passed to the cluster-control binary is built here.
//! Callers get the raw [`CommandOutput`] back and decide what a non-zero exit
//! means for them; [`Kubectl::checked`] turns it into an error.

use std::path::Path;
use std::sync::Arc;

use crate::error::{KubeError, Result};
use crate::exec::{CommandExecutor, CommandOutput};

/// Label key/value marking release storage objects managed by helmsync
pub const MANAGED_BY_LABEL: &str = "MANAGED-BY=HELMSYNC";

/// kubectl driven through a [`CommandExecutor`]
#[derive(Clone)]
pub struct Kubectl {
    executor: Arc<dyn CommandExecutor>,
    binary: String,
}

impl Kubectl {
    pub fn new(executor: Arc<dyn CommandExecutor>, binary: impl Into<String>) -> Self {
        Self {
            executor,
            binary: binary.into(),
        }
    }

    /// The executor used for kubectl and the other CLIs
    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run kubectl with `args`, logging `description`
    pub async fn run(&self, description: &str, args: Vec<String>) -> Result<CommandOutput> {
        tracing::debug!(command = %self.binary, "{}", description);
        self.executor.exec(&self.binary, &args).await
    }

    /// Run kubectl and fail on a non-zero exit
    pub async fn checked(&self, description: &str, args: Vec<String>) -> Result<CommandOutput> {
        let output = self.run(description, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(KubeError::CommandFailed {
                description: description.to_string(),
                code: output.code,
                stderr: output.diagnostic(),
            })
        }
    }

    /// The active context, if kubectl reports one
    pub async fn current_context(&self) -> Result<Option<String>> {
        let output = self
            .run("getting kubectl current context", args(["config", "current-context"]))
            .await?;
        let context = output.stdout.trim();
        if output.success() && !context.is_empty() {
            Ok(Some(context.to_string()))
        } else {
            Ok(None)
        }
    }

    pub async fn use_context(&self, context: &str) -> Result<CommandOutput> {
        self.run(
            &format!("setting kube context to [ {context} ]"),
            args(["config", "use-context", context]),
        )
        .await
    }

    /// Register a token-based identity
    pub async fn set_credentials_token(&self, user: &str, token: &str) -> Result<CommandOutput> {
        self.run(
            &format!("creating kubectl context - setting credentials for user [ {user} ]"),
            vec![
                "config".into(),
                "set-credentials".into(),
                user.into(),
                format!("--token={token}"),
            ],
        )
        .await
    }

    /// Register a username/password identity with a client key and optional
    /// client certificate. Key and certificate are embedded in the kubeconfig.
    pub async fn set_credentials_basic(
        &self,
        user: &str,
        password: &str,
        client_key: &Path,
        client_cert: Option<&Path>,
    ) -> Result<CommandOutput> {
        let mut argv = vec![
            "config".to_string(),
            "set-credentials".to_string(),
            user.to_string(),
            format!("--username={user}"),
            format!("--password={password}"),
            format!("--client-key={}", client_key.display()),
            "--embed-certs=true".to_string(),
        ];
        if let Some(cert) = client_cert {
            argv.push(format!("--client-certificate={}", cert.display()));
        }
        self.run(
            &format!("creating kubectl context - setting credentials for user [ {user} ]"),
            argv,
        )
        .await
    }

    /// Register the cluster with its CA embedded in the kubeconfig
    pub async fn set_cluster(&self, context: &str, server: &str, ca: &Path) -> Result<CommandOutput> {
        self.run(
            &format!("creating kubectl context - setting cluster [ {context} ]"),
            vec![
                "config".into(),
                "set-cluster".into(),
                context.into(),
                format!("--server={server}"),
                format!("--certificate-authority={}", ca.display()),
                "--embed-certs=true".into(),
            ],
        )
        .await
    }

    pub async fn set_context(&self, context: &str, user: &str) -> Result<CommandOutput> {
        self.run(
            &format!("creating kubectl context - setting context [ {context} ]"),
            vec![
                "config".into(),
                "set-context".into(),
                context.into(),
                format!("--cluster={context}"),
                format!("--user={user}"),
            ],
        )
        .await
    }

    pub async fn create_namespace(&self, namespace: &str) -> Result<CommandOutput> {
        self.run(
            &format!("creating namespace [ {namespace} ]"),
            args(["create", "namespace", namespace]),
        )
        .await
    }

    pub async fn label_namespace(&self, namespace: &str, key: &str, value: &str) -> Result<CommandOutput> {
        self.run(
            &format!("labeling namespace [ {namespace} ] with {key}={value}"),
            vec![
                "label".into(),
                "--overwrite".into(),
                format!("namespace/{namespace}"),
                format!("{key}={value}"),
            ],
        )
        .await
    }

    pub async fn annotate_namespace(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<CommandOutput> {
        self.run(
            &format!("annotating namespace [ {namespace} ] with {key}={value}"),
            vec![
                "annotate".into(),
                "--overwrite".into(),
                format!("namespace/{namespace}"),
                format!("{key}={value}"),
            ],
        )
        .await
    }

    /// `kubectl apply -f <file> -n <namespace>`
    pub async fn apply_file(&self, file: &Path, namespace: &str) -> Result<CommandOutput> {
        self.run(
            &format!("applying {} in namespace [ {namespace} ]", file.display()),
            vec![
                "apply".into(),
                "-f".into(),
                file.display().to_string(),
                "-n".into(),
                namespace.into(),
            ],
        )
        .await
    }

    /// List release storage objects of `kind` carrying the ownership marker
    pub async fn get_managed(&self, kind: &str, namespace: &str) -> Result<CommandOutput> {
        self.run(
            &format!("listing helmsync-managed releases in namespace [ {namespace} ]"),
            args(["get", kind, "-n", namespace, "-l", MANAGED_BY_LABEL]),
        )
        .await
    }

    /// `kubectl version --client`, used to check the binary is usable
    pub async fn client_version(&self) -> Result<String> {
        let output = self
            .checked("checking kubectl version", args(["version", "--client"]))
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}

fn args<const N: usize>(list: [&str; N]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
