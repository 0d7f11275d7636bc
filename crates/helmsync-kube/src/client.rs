//! Cluster session
//!
//! Bundles the kubectl wrapper, the object stores and the run options, and
//! drives the cluster-facing stages in order: context, namespaces, ownership.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use helmsync_core::DesiredState;
use tempfile::TempDir;

use crate::context::{BootstrapStage, ContextBootstrapper};
use crate::error::Result;
use crate::exec::CommandExecutor;
use crate::fetch::ObjectStores;
use crate::kubectl::Kubectl;
use crate::namespaces::{NamespaceReconciler, NamespaceReport};
use crate::ownership::{OwnedReleases, OwnershipDiscoverer};

/// Options for a cluster session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// kubectl binary name or path
    pub kubectl: String,
    /// Where fetched certificates and transient manifests go. A temporary
    /// directory is used when unset.
    pub work_dir: Option<PathBuf>,
    /// Deploy everything into this single namespace
    pub ns_override: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            work_dir: None,
            ns_override: None,
        }
    }
}

/// Outcome of [`ClusterSession::run`]
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub context: String,
    pub stage: BootstrapStage,
    pub namespaces: NamespaceReport,
    pub owned: OwnedReleases,
}

/// Talks to one cluster for the duration of a run
pub struct ClusterSession {
    kubectl: Kubectl,
    stores: ObjectStores,
    options: SessionOptions,
    work_dir: PathBuf,
    _scratch: Option<TempDir>,
}

impl ClusterSession {
    pub fn new(executor: Arc<dyn CommandExecutor>, options: SessionOptions) -> Result<Self> {
        let (work_dir, scratch) = match &options.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                (dir.clone(), None)
            }
            None => {
                let scratch = tempfile::Builder::new().prefix("helmsync-work-").tempdir()?;
                (scratch.path().to_path_buf(), Some(scratch))
            }
        };

        Ok(Self {
            kubectl: Kubectl::new(executor.clone(), options.kubectl.clone()),
            stores: ObjectStores::cli(executor),
            options,
            work_dir,
            _scratch: scratch,
        })
    }

    pub fn kubectl(&self) -> &Kubectl {
        &self.kubectl
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Log the kubectl client version at debug level
    pub async fn log_versions(&self) {
        match self.kubectl.client_version().await {
            Ok(version) => tracing::debug!("kubectl client version: {}", version),
            Err(e) => tracing::debug!("could not read kubectl client version: {}", e),
        }
    }

    /// Create or select the kube context
    pub async fn connect(&self, state: &mut DesiredState) -> Result<(String, BootstrapStage)> {
        let mut bootstrapper = ContextBootstrapper::new(&self.kubectl, &self.stores, &self.work_dir);
        let context = bootstrapper
            .ensure_context(&mut state.settings, &state.certificates)
            .await?;
        Ok((context, bootstrapper.stage()))
    }

    pub async fn reconcile_namespaces(&self, state: &mut DesiredState) -> Result<NamespaceReport> {
        NamespaceReconciler::new(&self.kubectl, &self.work_dir)
            .reconcile(state, self.options.ns_override.as_deref())
            .await
    }

    pub async fn discover_owned(&self, state: &DesiredState) -> Result<OwnedReleases> {
        OwnershipDiscoverer::new(&self.kubectl)
            .discover(state, self.options.ns_override.as_deref())
            .await
    }

    /// Context, then namespaces, then ownership discovery
    pub async fn run(&self, state: &mut DesiredState) -> Result<SessionReport> {
        self.log_versions().await;
        let (context, stage) = self.connect(state).await?;
        let namespaces = self.reconcile_namespaces(state).await?;
        let owned = self.discover_owned(state).await?;
        Ok(SessionReport {
            context,
            stage,
            namespaces,
            owned,
        })
    }
}
