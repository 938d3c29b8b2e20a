use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the configured sources once and notify about new records.
    Check(CheckArgs),
    /// Inspect the persisted state document.
    State {
        #[command(subcommand)]
        command: StateCommand,
    },
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to the state document.
    #[arg(long, default_value = "state.json")]
    pub state: String,

    /// Sources to check (`all` or comma-separated ids). Overrides MEDWATCH_SOURCES.
    #[arg(long)]
    pub sources: Option<String>,

    /// Weekday on which a gated source may be skipped.
    #[arg(long, default_value = "fri")]
    pub reduced_day: String,

    /// Per-request timeout for page fetches.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Log notifications instead of sending them; credentials are not required.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, default_value = crate::source::eliky::DEFAULT_URL)]
    pub eliky_url: String,

    #[arg(long, default_value = crate::source::unci::DEFAULT_URL)]
    pub unci_url: String,
}

#[derive(Debug, Subcommand)]
pub enum StateCommand {
    Show(StateShowArgs),
}

#[derive(Debug, Args)]
pub struct StateShowArgs {
    /// Path to the state document.
    #[arg(long, default_value = "state.json")]
    pub state: String,
}
