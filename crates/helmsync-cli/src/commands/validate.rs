//! Validate command - load and validate a desired state file

use console::style;
use helmsync_core::{Validation, validate};

use super::{RunContext, StateArgs, load_state, validate_options};
use crate::error::Result;

pub async fn run(args: &StateArgs, ctx: &mut RunContext) -> Result<()> {
    let mut loaded = load_state(args, ctx)?;
    let options = validate_options(args, &loaded.state, &args.local_kubectl()).await;

    match validate(&mut loaded.state, &options)? {
        Validation::Valid => {
            println!(
                "{} {} is valid ({} apps, {} namespaces)",
                style("✓").green().bold(),
                args.file.display(),
                loaded.state.apps.len(),
                loaded.state.namespaces.len()
            );
        }
        Validation::NoApps => {
            println!(
                "{} {} is valid but declares no apps, nothing to be executed",
                style("✓").green().bold(),
                args.file.display()
            );
        }
    }

    Ok(())
}
