//! Reconcile command - connect to the cluster, reconcile namespaces and
//! discover the releases helmsync already manages

use console::style;
use std::sync::Arc;

use helmsync_core::{Validation, validate};
use helmsync_kube::{ClusterSession, ProcessExecutor};

use super::{RunContext, StateArgs, load_state, validate_options};
use crate::display;
use crate::error::Result;

pub async fn run(args: &StateArgs, ctx: &mut RunContext) -> Result<()> {
    let mut loaded = load_state(args, ctx)?;
    let session = ClusterSession::new(Arc::new(ProcessExecutor::new()), args.session_options())?;
    let options = validate_options(args, &loaded.state, session.kubectl()).await;

    if validate(&mut loaded.state, &options)? == Validation::NoApps {
        println!("{}", style("No apps specified, nothing to be executed.").dim());
        return Ok(());
    }

    let report = session.run(&mut loaded.state).await?;

    println!(
        "{} Connected to kube context {}",
        style("✓").green().bold(),
        style(&report.context).cyan()
    );
    display::print_namespace_report(&report.namespaces);
    display::print_owned(&report.owned);

    Ok(())
}
