//! helmsync CLI - reconcile a desired-state file against a Kubernetes cluster

use clap::{Parser, Subcommand};

use helmsync_kube::{Notifier, SlackNotifier};

mod commands;
mod display;
mod error;
mod exit_codes;
mod logging;

use commands::{RunContext, StateArgs};
use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "helmsync")]
#[command(author = "helmsync Contributors")]
#[command(version)]
#[command(about = "Reconcile namespaces and cluster access from a desired-state file", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a desired state file
    Validate(StateArgs),

    /// Print the resolved desired state
    Show(StateArgs),

    /// Set up the kube context, reconcile namespaces and discover managed releases
    Reconcile(StateArgs),
}

async fn dispatch(command: Commands, ctx: &mut RunContext) -> Result<()> {
    match command {
        Commands::Validate(args) => commands::validate::run(&args, ctx).await,
        Commands::Show(args) => commands::show::run(&args, ctx),
        Commands::Reconcile(args) => commands::reconcile::run(&args, ctx).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    logging::init(cli.verbose, cli.debug);

    let mut ctx = RunContext::default();
    if let Err(err) = dispatch(cli.command, &mut ctx).await {
        let code = report_failure(err, &ctx).await;
        std::process::exit(code);
    }
}

/// The only failure path: notify if a webhook is configured, render the
/// diagnostic and return the exit code.
async fn report_failure(err: CliError, ctx: &RunContext) -> i32 {
    if let Some(webhook) = ctx.webhook.as_deref().filter(|w| helmsync_core::is_request_uri(w)) {
        match SlackNotifier::new() {
            Ok(notifier) => {
                if !notifier.notify(&err.to_string(), webhook, true).await {
                    tracing::warn!("failure notification was not delivered");
                }
            }
            Err(e) => tracing::warn!("could not create notifier: {}", e),
        }
    }

    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    code
}
