use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "altscout", version, about = "Find wiki images without alternate text and notify their authors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file
    #[arg(short, long, global = true, default_value = "altscout.yaml")]
    pub config: String,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress bars and the closing summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full audit and notification pipeline
    Run(RunArgs),
    /// Show task flags and state store counts
    Status(StatusArgs),
    /// Clear task flags so the next run starts from the beginning
    Reset(ResetArgs),
    /// Validate a configuration file
    Validate,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// State store path (overrides store.path)
    #[arg(long)]
    pub db: Option<String>,

    /// Write messages as .eml files instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Directory for --dry-run messages (defaults to the run's journal directory)
    #[arg(long, requires = "dry_run")]
    pub outbox: Option<String>,

    /// Date to audit as, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub today: Option<String>,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    /// State store path (overrides store.path)
    #[arg(long)]
    pub db: Option<String>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ResetArgs {
    /// State store path (overrides store.path)
    #[arg(long)]
    pub db: Option<String>,

    /// Also clear per-page run markers
    #[arg(long)]
    pub pages: bool,
}
