//! Kube context bootstrap
//!
//! Creating a context is a linear sequence of stages with no retries:
//!
//! ```text
//! Start -> CredentialsResolved -> CertsFetched -> CredentialsRegistered
//!       -> ClusterRegistered -> ContextRegistered -> Done
//! ```
//!
//! A failing step aborts the sequence with [`KubeError::ContextSetup`], which
//! carries the last stage reached and the context name.

use std::fmt;
use std::path::{Path, PathBuf};

use helmsync_core::{CA_CLIENT, CA_CRT, CA_KEY, Certificates, Location, Settings};

use crate::error::{KubeError, Result};
use crate::exec::CommandOutput;
use crate::fetch::ObjectStores;
use crate::kubectl::Kubectl;

/// In-cluster service account token, used in bearer mode without a path
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Identity registered in bearer mode when no username is configured
pub const DEFAULT_BEARER_USER: &str = "helmsync";

/// Local file names of fetched artifacts, inside the work directory
pub const CA_CRT_FILE: &str = "ca.crt";
pub const CA_KEY_FILE: &str = "ca.key";
pub const CLIENT_CRT_FILE: &str = "client.crt";
pub const TOKEN_FILE: &str = "bearer.token";

/// Progress of a context bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapStage {
    Start,
    CredentialsResolved,
    CertsFetched,
    CredentialsRegistered,
    ClusterRegistered,
    ContextRegistered,
    Done,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStage::Start => "start",
            BootstrapStage::CredentialsResolved => "credentials-resolved",
            BootstrapStage::CertsFetched => "certs-fetched",
            BootstrapStage::CredentialsRegistered => "credentials-registered",
            BootstrapStage::ClusterRegistered => "cluster-registered",
            BootstrapStage::ContextRegistered => "context-registered",
            BootstrapStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Registers and selects the kube context described by the settings
pub struct ContextBootstrapper<'a> {
    kubectl: &'a Kubectl,
    stores: &'a ObjectStores,
    work_dir: PathBuf,
    stage: BootstrapStage,
    context: String,
}

impl<'a> ContextBootstrapper<'a> {
    /// Artifacts are written into `work_dir`, which must exist
    pub fn new(kubectl: &'a Kubectl, stores: &'a ObjectStores, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            kubectl,
            stores,
            work_dir: work_dir.into(),
            stage: BootstrapStage::Start,
            context: String::new(),
        }
    }

    /// The last stage reached
    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    /// Make the configured context usable and return its name.
    ///
    /// With a cluster URI the context is created from scratch. Without one
    /// an existing context is selected: the configured name if set, else
    /// whatever kubectl currently points at.
    pub async fn ensure_context(
        &mut self,
        settings: &mut Settings,
        certificates: &Certificates,
    ) -> Result<String> {
        if !settings.cluster_uri.is_empty() {
            self.bootstrap(settings, certificates).await?;
            return Ok(settings.kube_context.clone());
        }

        if settings.kube_context.is_empty() {
            let current = self.kubectl.current_context().await?;
            let context = current.ok_or_else(|| KubeError::ContextNotFound(String::new()))?;
            tracing::info!("using current kube context [ {} ]", context);
            self.stage = BootstrapStage::Done;
            return Ok(context);
        }

        self.context = settings.kube_context.clone();
        let output = self
            .kubectl
            .use_context(&settings.kube_context)
            .await
            .map_err(|e| self.abort(e.to_string()))?;
        if !output.success() {
            tracing::debug!("use-context failed: {}", output.diagnostic());
            return Err(KubeError::ContextNotFound(settings.kube_context.clone()));
        }
        tracing::info!("kube context [ {} ] selected", settings.kube_context);
        self.stage = BootstrapStage::Done;
        Ok(settings.kube_context.clone())
    }

    /// Create the context from the settings and certificates and make it the
    /// active one.
    pub async fn bootstrap(&mut self, settings: &mut Settings, certificates: &Certificates) -> Result<()> {
        self.stage = BootstrapStage::Start;
        self.context = settings.kube_context.clone();
        tracing::info!("creating kube context [ {} ]", self.context);

        self.resolve_credentials(settings, certificates)?;
        self.advance(BootstrapStage::CredentialsResolved);

        let artifacts = self.fetch_artifacts(settings, certificates).await?;
        self.advance(BootstrapStage::CertsFetched);

        if settings.bearer_token {
            let token_file = artifacts.token.as_deref().unwrap_or(Path::new(TOKEN_FILE));
            let token = tokio::fs::read_to_string(token_file)
                .await
                .map_err(|e| self.abort(format!("failed to read bearer token: {e}")))?;
            self.step(
                self.kubectl
                    .set_credentials_token(&settings.username, token.trim())
                    .await,
            )?;
        } else {
            self.step(
                self.kubectl
                    .set_credentials_basic(
                        &settings.username,
                        &settings.password,
                        &artifacts.ca_key,
                        artifacts.client_cert.as_deref(),
                    )
                    .await,
            )?;
        }
        self.advance(BootstrapStage::CredentialsRegistered);

        self.step(
            self.kubectl
                .set_cluster(&self.context, &settings.cluster_uri, &artifacts.ca_crt)
                .await,
        )?;
        self.advance(BootstrapStage::ClusterRegistered);

        self.step(self.kubectl.set_context(&self.context, &settings.username).await)?;
        self.step(self.kubectl.use_context(&self.context).await)?;
        self.advance(BootstrapStage::ContextRegistered);

        self.advance(BootstrapStage::Done);
        tracing::info!("kube context [ {} ] created and selected", self.context);
        Ok(())
    }

    fn resolve_credentials(&self, settings: &mut Settings, certificates: &Certificates) -> Result<()> {
        if settings.bearer_token {
            if settings.bearer_token_path.is_empty() {
                tracing::info!("bearer token path not set, using {}", DEFAULT_TOKEN_PATH);
                settings.bearer_token_path = DEFAULT_TOKEN_PATH.to_string();
            }
            if settings.username.is_empty() {
                settings.username = DEFAULT_BEARER_USER.to_string();
            }
        } else {
            if settings.username.is_empty()
                || settings.password.is_empty()
                || settings.cluster_uri.is_empty()
            {
                return Err(self.abort(
                    "missing information to create context: username, password and clusterURI are required",
                ));
            }
            if !certificates.contains_key(CA_KEY) {
                return Err(self.abort("certificate caKey is required"));
            }
        }
        if !certificates.contains_key(CA_CRT) {
            return Err(self.abort("certificate caCrt is required"));
        }
        Ok(())
    }

    async fn fetch_artifacts(&self, settings: &Settings, certificates: &Certificates) -> Result<Artifacts> {
        let mut artifacts = Artifacts {
            ca_crt: self.work_dir.join(CA_CRT_FILE),
            ca_key: self.work_dir.join(CA_KEY_FILE),
            client_cert: None,
            token: None,
        };

        for (key, file) in [(CA_CRT, CA_CRT_FILE), (CA_KEY, CA_KEY_FILE), (CA_CLIENT, CLIENT_CRT_FILE)] {
            let Some(reference) = certificates.get(key) else {
                continue;
            };
            let dest = self.work_dir.join(file);
            self.download(reference, &dest).await?;
            if key == CA_CLIENT {
                artifacts.client_cert = Some(dest);
            }
        }

        if settings.bearer_token {
            let dest = self.work_dir.join(TOKEN_FILE);
            self.download(&settings.bearer_token_path, &dest).await?;
            artifacts.token = Some(dest);
        }

        Ok(artifacts)
    }

    async fn download(&self, reference: &str, dest: &Path) -> Result<()> {
        self.stores
            .download(&Location::parse(reference), dest)
            .await
            .map_err(|e| self.abort(e.to_string()))
    }

    fn advance(&mut self, stage: BootstrapStage) {
        tracing::debug!(context = %self.context, %stage, "context bootstrap");
        self.stage = stage;
    }

    /// A kubectl call that could not run or exited non-zero aborts the bootstrap
    fn step(&self, result: Result<CommandOutput>) -> Result<()> {
        match result {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(self.abort(output.diagnostic())),
            Err(e) => Err(self.abort(e.to_string())),
        }
    }

    fn abort(&self, message: impl Into<String>) -> KubeError {
        KubeError::ContextSetup {
            context: self.context.clone(),
            stage: self.stage,
            message: message.into(),
        }
    }
}

struct Artifacts {
    ca_crt: PathBuf,
    ca_key: PathBuf,
    client_cert: Option<PathBuf>,
    token: Option<PathBuf>,
}
