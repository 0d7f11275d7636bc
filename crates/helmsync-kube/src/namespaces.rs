//! Namespace reconciliation
//!
//! Each declared namespace is created, labelled, annotated and given its
//! LimitRange. Every step is idempotent: an existing namespace is not an
//! error and labels and annotations are applied with `--overwrite`.

use std::io::Write;
use std::path::PathBuf;

use helmsync_core::{DesiredState, LimitRule, Namespace};

use crate::error::{KubeError, Result};
use crate::kubectl::Kubectl;

const LIMIT_RANGE_HEADER: &str = "---
apiVersion: v1
kind: LimitRange
metadata:
  name: limit-range
spec:
  limits:
";

/// Render the LimitRange manifest for `rules`
pub fn limit_range_manifest(rules: &[LimitRule]) -> Result<String> {
    let limits = serde_yaml::to_string(rules)?;
    Ok(format!("{LIMIT_RANGE_HEADER}{}", indent(&limits, 4)))
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("{pad}{line}\n")
            }
        })
        .collect()
}

/// What a reconciliation run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceReport {
    /// Namespaces created by this run
    pub created: Vec<String>,
    /// Namespaces that already existed
    pub existing: Vec<String>,
    pub labels: usize,
    pub annotations: usize,
    pub limit_ranges: usize,
    /// Label or annotation calls that failed and were skipped
    pub warnings: usize,
}

/// Brings the cluster's namespaces in line with the desired state
pub struct NamespaceReconciler<'a> {
    kubectl: &'a Kubectl,
    work_dir: PathBuf,
}

impl<'a> NamespaceReconciler<'a> {
    /// Transient manifests are written into `work_dir`
    pub fn new(kubectl: &'a Kubectl, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            kubectl,
            work_dir: work_dir.into(),
        }
    }

    /// Reconcile every declared namespace, or only `ns_override` when set.
    ///
    /// In override mode every app is moved into the override namespace and
    /// the declared namespaces are ignored.
    pub async fn reconcile(
        &self,
        state: &mut DesiredState,
        ns_override: Option<&str>,
    ) -> Result<NamespaceReport> {
        let mut report = NamespaceReport::default();

        if let Some(ns) = ns_override {
            tracing::info!("overriding namespaces: all apps are deployed to [ {} ]", ns);
            for app in state.apps.values_mut() {
                app.namespace = ns.to_string();
            }
            self.reconcile_namespace(ns, &Namespace::default(), &mut report)
                .await?;
            return Ok(report);
        }

        for (name, ns) in &state.namespaces {
            self.reconcile_namespace(name, ns, &mut report).await?;
        }
        Ok(report)
    }

    /// Create, label, annotate and limit a single namespace
    pub async fn reconcile_namespace(
        &self,
        name: &str,
        ns: &Namespace,
        report: &mut NamespaceReport,
    ) -> Result<()> {
        self.create(name, report).await?;

        for (key, value) in &ns.labels {
            let output = self.kubectl.label_namespace(name, key, value).await?;
            if output.success() {
                report.labels += 1;
            } else {
                tracing::warn!(
                    "could not label namespace [ {} ] with {}={}: {}",
                    name,
                    key,
                    value,
                    output.diagnostic()
                );
                report.warnings += 1;
            }
        }

        for (key, value) in &ns.annotations {
            let output = self.kubectl.annotate_namespace(name, key, value).await?;
            if output.success() {
                report.annotations += 1;
            } else {
                tracing::warn!(
                    "could not annotate namespace [ {} ] with {}={}: {}",
                    name,
                    key,
                    value,
                    output.diagnostic()
                );
                report.warnings += 1;
            }
        }

        if !ns.limits.is_empty() {
            self.apply_limits(name, &ns.limits).await?;
            report.limit_ranges += 1;
        }

        Ok(())
    }

    async fn create(&self, name: &str, report: &mut NamespaceReport) -> Result<()> {
        let output = self.kubectl.create_namespace(name).await?;
        if output.success() {
            tracing::info!("namespace [ {} ] created", name);
            report.created.push(name.to_string());
            return Ok(());
        }

        let diagnostic = output.diagnostic();
        if is_already_exists(&diagnostic) {
            tracing::debug!("namespace [ {} ] exists", name);
            report.existing.push(name.to_string());
            Ok(())
        } else {
            Err(KubeError::Namespace {
                namespace: name.to_string(),
                message: diagnostic,
            })
        }
    }

    async fn apply_limits(&self, name: &str, rules: &[LimitRule]) -> Result<()> {
        let manifest = limit_range_manifest(rules)?;

        let mut file = tempfile::Builder::new()
            .prefix("limit-range-")
            .suffix(".yaml")
            .tempfile_in(&self.work_dir)?;
        file.write_all(manifest.as_bytes())?;
        file.flush()?;

        let applied = self.kubectl.apply_file(file.path(), name).await;
        if let Err(e) = file.close() {
            tracing::warn!("could not remove LimitRange manifest: {}", e);
        }
        let output = applied?;

        if output.success() {
            tracing::info!("LimitRange applied to namespace [ {} ]", name);
            Ok(())
        } else {
            Err(KubeError::LimitRange {
                namespace: name.to_string(),
                message: output.diagnostic(),
            })
        }
    }
}

fn is_already_exists(diagnostic: &str) -> bool {
    diagnostic.contains("AlreadyExists") || diagnostic.contains("already exists")
}
