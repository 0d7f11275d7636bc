//! Release ownership discovery
//!
//! Helm keeps one storage object (a secret or a configmap) per release
//! revision. helmsync marks the ones it manages with a label; listing the
//! marked objects tells which declared apps are already deployed by us.
//!
//! kubectl's tabular output is only ever read by [`parse_listing`].

use std::collections::{BTreeMap, BTreeSet};

use helmsync_core::DesiredState;

use crate::error::{KubeError, Result};
use crate::kubectl::Kubectl;

const NO_RESOURCES: &str = "no resources found";
const REVISION_DELIMITER: &str = ".v";

/// One storage object from a `kubectl get` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// Object name as listed, e.g. `myapp.v3`
    pub name: String,
    /// Release name with the revision suffix removed, e.g. `myapp`
    pub release: String,
}

/// Parse `kubectl get` output into rows.
///
/// Empty lines, the header (ending in `AGE`) and the "No resources found"
/// notice, in any case, are skipped. The release is the first column up to the last `.v`.
pub fn parse_listing(output: &str) -> Vec<ListingRow> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.ends_with("AGE")
                && !line.to_ascii_lowercase().contains(NO_RESOURCES)
        })
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| {
            let release = match name.rfind(REVISION_DELIMITER) {
                Some(idx) => &name[..idx],
                None => name,
            };
            ListingRow {
                name: name.to_string(),
                release: release.to_string(),
            }
        })
        .collect()
}

/// Apps managed by helmsync, keyed by namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedReleases(BTreeMap<String, BTreeSet<String>>);

impl OwnedReleases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record app `label` as owned in `namespace`
    pub fn insert(&mut self, namespace: &str, label: &str) -> bool {
        self.0
            .entry(namespace.to_string())
            .or_default()
            .insert(label.to_string())
    }

    pub fn is_owned(&self, namespace: &str, label: &str) -> bool {
        self.0.get(namespace).is_some_and(|apps| apps.contains(label))
    }

    pub fn namespace(&self, namespace: &str) -> Option<&BTreeSet<String>> {
        self.0.get(namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of owned apps over all namespaces
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }
}

/// Finds the releases already deployed and managed by helmsync
pub struct OwnershipDiscoverer<'a> {
    kubectl: &'a Kubectl,
}

impl<'a> OwnershipDiscoverer<'a> {
    pub fn new(kubectl: &'a Kubectl) -> Self {
        Self { kubectl }
    }

    /// Query every declared namespace (or only `ns_override`) and map the
    /// listed releases back to app labels.
    pub async fn discover(
        &self,
        state: &DesiredState,
        ns_override: Option<&str>,
    ) -> Result<OwnedReleases> {
        let backend = state.storage_backend();
        let namespaces: Vec<&str> = match ns_override {
            Some(ns) => vec![ns],
            None => state.namespaces.keys().map(String::as_str).collect(),
        };

        let mut owned = OwnedReleases::new();
        for ns in namespaces {
            let output = self.kubectl.get_managed(backend, ns).await?;
            if !output.success() {
                return Err(KubeError::Ownership {
                    namespace: ns.to_string(),
                    message: output.diagnostic(),
                });
            }

            for row in parse_listing(&output.stdout) {
                for (label, app) in &state.apps {
                    if app.name == row.release && owned.insert(ns, label) {
                        tracing::debug!("release [ {} ] in namespace [ {} ] is managed", app.name, ns);
                    }
                }
            }
        }

        tracing::info!("{} helmsync-managed release(s) found", owned.len());
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::mock::MockExecutor;
    use helmsync_core::{App, Namespace};
    use std::sync::Arc;

    const LISTING: &str = "\
NAME                            TYPE                 DATA   AGE
sh.helm.release.myapp.v1        helm.sh/release.v1   1      3d
sh.helm.release.myapp.v2        helm.sh/release.v1   1      1d
";

    fn app(name: &str, namespace: &str) -> App {
        App {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    fn state() -> DesiredState {
        let mut state = DesiredState::default();
        state.namespaces.insert("prod".into(), Namespace::default());
        state.apps.insert("myapp".into(), app("myapp", "prod"));
        state
    }

    #[test]
    fn test_parse_listing_skips_noise() {
        let output = "NAME         DATA   AGE\n\nmyapp.v1     1      3d\nNo resources found in prod namespace.\n";
        let rows = parse_listing(output);

        assert_eq!(
            rows,
            vec![ListingRow {
                name: "myapp.v1".into(),
                release: "myapp".into()
            }]
        );
    }

    #[test]
    fn test_parse_listing_sentinel_any_case() {
        let output = "no resources found in prod namespace.\nNO RESOURCES FOUND\n";
        assert!(parse_listing(output).is_empty());
    }

    #[test]
    fn test_parse_listing_strips_last_revision() {
        let rows = parse_listing(LISTING);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].release, "sh.helm.release.myapp");

        let rows = parse_listing("my.vault.v12   3   1d\nplain   1   1d\n");
        assert_eq!(rows[0].release, "my.vault");
        assert_eq!(rows[1].release, "plain");
    }

    #[tokio::test]
    async fn test_two_revisions_owned_once() {
        let mock = MockExecutor::new();
        mock.respond(
            &["get"],
            CommandOutput::ok("NAME       DATA   AGE\nmyapp.v1   1      3d\nmyapp.v2   1      1d\n"),
        );
        let kubectl = Kubectl::new(Arc::new(mock.clone()), "kubectl");

        let owned = OwnershipDiscoverer::new(&kubectl)
            .discover(&state(), None)
            .await
            .unwrap();

        assert_eq!(owned.len(), 1);
        assert!(owned.is_owned("prod", "myapp"));
        assert_eq!(
            mock.calls()[0].args,
            vec!["get", "secret", "-n", "prod", "-l", "MANAGED-BY=HELMSYNC"]
        );
    }

    #[tokio::test]
    async fn test_empty_cluster() {
        let mock = MockExecutor::new();
        let kubectl = Kubectl::new(Arc::new(mock), "kubectl");

        let owned = OwnershipDiscoverer::new(&kubectl)
            .discover(&state(), None)
            .await
            .unwrap();
        assert!(owned.is_empty());
    }

    #[tokio::test]
    async fn test_storage_backend_and_override() {
        let mock = MockExecutor::new();
        mock.respond(&["get"], CommandOutput::ok("NAME   DATA   AGE\nmyapp.v4   1   1d\n"));
        let kubectl = Kubectl::new(Arc::new(mock.clone()), "kubectl");
        let mut state = state();
        state.settings.storage_backend = "configmap".into();

        let owned = OwnershipDiscoverer::new(&kubectl)
            .discover(&state, Some("sandbox"))
            .await
            .unwrap();

        assert!(owned.is_owned("sandbox", "myapp"));
        assert!(owned.namespace("prod").is_none());
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args[1], "configmap");
        assert_eq!(calls[0].args[3], "sandbox");
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let mock = MockExecutor::new();
        mock.respond(&["get"], CommandOutput::failed(1, "error: the server doesn't have a resource type"));
        let kubectl = Kubectl::new(Arc::new(mock), "kubectl");

        let err = OwnershipDiscoverer::new(&kubectl)
            .discover(&state(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Ownership { .. }));
    }
}
