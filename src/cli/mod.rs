use anyhow::Result;
use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

// CLI Commands (cmd_ prefix)
mod cmd_fetch;
mod cmd_history;
mod cmd_search;

// Helper modules (no cmd_ prefix)
mod logger;
mod utils;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format custom help template with grouped commands
fn format_help_template() -> &'static str {
    concat!(
        "{about-with-newline}\n\n",
        "{usage-heading}\n  {usage}\n\n",
        "Options:\n{options}\n\n",
        "Fetching:\n",
        "  fetch     Fetch a URL, falling back to the Wayback Machine\n",
        "\n",
        "Archive:\n",
        "  search    List archived captures of a URL\n",
        "  history   Walk back through playable captures of a URL\n",
        "\n",
        "See 'wayback-fetch <COMMAND> --help' for more information on a specific command.\n"
    )
}

#[derive(Parser)]
#[command(bin_name = "wayback-fetch")]
#[command(version = VERSION)]
#[command(about = concat!("wayback-fetch v", env!("CARGO_PKG_VERSION"), " - live fetches with Wayback Machine fallback"))]
#[command(long_about = concat!(
    "wayback-fetch v", env!("CARGO_PKG_VERSION"), " - live fetches with Wayback Machine fallback\n\n",
    "Fetches URLs the way a crawler would, answering from the newest\n",
    "playable Wayback Machine capture when the origin fails or when\n",
    "proxy mode is enabled.\n\n",
    "Settings are read from WAYBACK_MACHINE_* environment variables and\n",
    "an optional JSON settings file; command-line flags win over both."
))]
#[command(propagate_version = true)]
#[command(help_template = format_help_template())]
pub struct Cli {
    /// JSON settings file (WAYBACK_MACHINE_* keys)
    #[arg(short = 's', long, global = true, value_hint = ValueHint::FilePath)]
    settings: Option<PathBuf>,

    /// Wayback Machine base URL
    #[arg(long, global = true, value_hint = ValueHint::Url)]
    archive_url: Option<String>,

    /// Suppress informational output
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Fetch(cmd_fetch::FetchCommand),
    Search(cmd_search::SearchCommand),
    History(cmd_history::HistoryCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger based on verbosity flags
    logger::init_logger(cli.verbose, cli.quiet);

    let settings = utils::load_settings(cli.settings.as_deref(), cli.archive_url)?;

    match cli.command {
        Commands::Fetch(cmd) => cmd_fetch::run(cmd, settings)?,
        Commands::Search(cmd) => cmd_search::run(cmd, settings)?,
        Commands::History(cmd) => cmd_history::run(cmd, settings)?,
    }

    Ok(())
}

/// Macro to create clap help templates with examples
/// This works around the limitation that {bin} doesn't work in after_help
#[macro_export]
macro_rules! clap_help {
    (examples: $examples:literal) => {{
        const BIN: &str = "wayback-fetch";
        concat!(
            "{about-with-newline}\n",
            "{usage-heading} {usage}\n\n",
            "{all-args}\n\n",
            "Examples:\n",
            $examples
        ).replace("{bin}", BIN)
    }};
}
