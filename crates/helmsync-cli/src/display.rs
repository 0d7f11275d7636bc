//! Display formatting for CLI output
//!
//! Provides structured display for:
//! - The resolved desired state (`show`)
//! - Namespace reconciliation and ownership summaries (`reconcile`)

use console::style;
use std::path::Path;

use helmsync_core::{DesiredState, Settings};
use helmsync_kube::{NamespaceReport, OwnedReleases};

/// Print the resolved desired state
pub fn print_state(state: &DesiredState, source: &Path) {
    let title = source.display().to_string();
    println!("{}", style(&title).cyan().bold());
    println!("{}", style("=".repeat(title.len())).dim());

    if !state.metadata.is_empty() {
        println!();
        for (key, value) in &state.metadata {
            println!("{}: {}", style(key).bold(), value);
        }
    }

    println!();
    println!("{}:", style("Settings").bold());
    for (key, value) in settings_rows(&state.settings) {
        println!("  {:<16} {}", key, value);
    }

    if !state.certificates.is_empty() {
        println!();
        println!("{}:", style("Certificates").bold());
        for (key, value) in &state.certificates {
            println!("  {:<16} {}", key, value);
        }
    }

    println!();
    println!("{}:", style("Namespaces").bold());
    for (name, ns) in &state.namespaces {
        let mut details = Vec::new();
        if ns.protected {
            details.push("protected".to_string());
        }
        if !ns.labels.is_empty() {
            details.push(format!("{} labels", ns.labels.len()));
        }
        if !ns.annotations.is_empty() {
            details.push(format!("{} annotations", ns.annotations.len()));
        }
        if !ns.limits.is_empty() {
            details.push(format!("{} limit rules", ns.limits.len()));
        }
        if details.is_empty() {
            println!("  {}", name);
        } else {
            println!("  {} {}", name, style(format!("({})", details.join(", "))).dim());
        }
    }

    if !state.helm_repos.is_empty() || !state.preconfigured_helm_repos.is_empty() {
        println!();
        println!("{}:", style("Repositories").bold());
        for (name, url) in &state.helm_repos {
            println!("  {:<16} {}", name, url);
        }
        for name in &state.preconfigured_helm_repos {
            println!("  {:<16} {}", name, style("(preconfigured)").dim());
        }
    }

    println!();
    println!("{}:", style("Apps").bold());
    if state.apps.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for (label, app) in &state.apps {
        let marker = if app.enabled {
            style("●").green()
        } else {
            style("○").dim()
        };
        let version = if app.version.is_empty() {
            String::new()
        } else {
            format!(" {}", app.version)
        };
        println!(
            "  {} {} -> {}/{} [{}{}] priority {}",
            marker,
            style(label).bold(),
            app.namespace,
            app.name,
            app.chart,
            version,
            app.priority
        );
    }
}

fn settings_rows(settings: &Settings) -> Vec<(&'static str, String)> {
    let mut rows = vec![("kubeContext", settings.kube_context.clone())];
    if !settings.cluster_uri.is_empty() {
        rows.push(("clusterURI", settings.cluster_uri.clone()));
    }
    if settings.bearer_token {
        rows.push(("credentials", "bearer token".to_string()));
        rows.push(("bearerTokenPath", settings.bearer_token_path.clone()));
    } else if !settings.username.is_empty() {
        rows.push(("credentials", format!("user {}", settings.username)));
    }
    rows.push(("storageBackend", settings.storage_backend.clone()));
    if !settings.slack_webhook.is_empty() {
        rows.push(("slackWebhook", "(set)".to_string()));
    }
    rows.into_iter()
        .map(|(key, value)| {
            if value.is_empty() {
                (key, "-".to_string())
            } else {
                (key, value)
            }
        })
        .collect()
}

/// Print what namespace reconciliation did
pub fn print_namespace_report(report: &NamespaceReport) {
    for name in &report.created {
        println!("{} Namespace {} created", style("✓").green().bold(), style(name).cyan());
    }
    for name in &report.existing {
        println!("{} Namespace {} already exists", style("•").dim(), style(name).cyan());
    }
    println!(
        "  {} labels, {} annotations, {} limit ranges applied",
        report.labels, report.annotations, report.limit_ranges
    );
    if report.warnings > 0 {
        println!(
            "{} {} label/annotation call(s) failed, see the log",
            style("!").yellow().bold(),
            report.warnings
        );
    }
}

/// Print the releases already managed by helmsync
pub fn print_owned(owned: &OwnedReleases) {
    if owned.is_empty() {
        println!("{} No helmsync-managed releases found", style("•").dim());
        return;
    }
    println!("{} {} helmsync-managed release(s):", style("✓").green().bold(), owned.len());
    for (namespace, apps) in owned.iter() {
        for app in apps {
            println!("  {}/{}", namespace, app);
        }
    }
}
