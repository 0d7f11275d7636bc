//! helmsync kube - everything that talks to the cluster
//!
//! This crate provides:
//! - **Command execution**: the `CommandExecutor` seam, a process-backed
//!   executor and a scripted `MockExecutor`
//! - **Context bootstrap**: credential, certificate and context registration
//! - **Namespace reconciliation**: idempotent create/label/annotate/LimitRange
//! - **Ownership discovery**: which declared apps are already managed
//! - **Notifications**: Slack-compatible webhook messages

pub mod client;
pub mod context;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod kubectl;
pub mod mock;
pub mod namespaces;
pub mod notify;
pub mod ownership;

pub use client::{ClusterSession, SessionOptions, SessionReport};
pub use context::{BootstrapStage, ContextBootstrapper};
pub use error::{KubeError, Result};
pub use exec::{CommandExecutor, CommandOutput, ProcessExecutor};
pub use fetch::{CliObjectStore, ObjectStore, ObjectStores};
pub use kubectl::Kubectl;
pub use mock::{MockExecutor, RecordedCall};
pub use namespaces::{NamespaceReconciler, NamespaceReport, limit_range_manifest};
pub use notify::{Notifier, SlackNotifier};
pub use ownership::{ListingRow, OwnedReleases, OwnershipDiscoverer, parse_listing};
