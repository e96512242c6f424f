use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "policyctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile declared security policy against a remote policy backend", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/config.toml)
    #[arg(long, global = true, env = "POLICYCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Observed-state cache (default: <state dir>/state.toml)
    #[arg(long, global = true, env = "POLICYCTL_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would send, without changing anything
    Plan(SelectArgs),

    /// Create or update declared resources
    Apply(ApplyArgs),

    /// Re-fetch a resource and refresh its cached observation
    Read(TargetArgs),

    /// Delete a resource, detaching it from its referrers first
    Delete(DeleteArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Args)]
pub struct SelectArgs {
    /// Desired-state manifest (default: <config dir>/manifest.toml)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Only this resource kind
    pub kind: Option<String>,

    /// Only the resource with this name
    pub name: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct TargetArgs {
    /// Resource kind, e.g. rate_limit_practice
    pub kind: String,

    /// Resource name as declared in the manifest
    pub name: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
