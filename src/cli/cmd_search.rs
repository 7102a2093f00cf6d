use anyhow::Result;
use clap::{Args, ValueHint};
use wayback_fallback::{ArchiveClient, Settings, WaybackClient};

use super::utils::{format_time, runtime, truncate};

#[derive(Args, Debug)]
#[command(
    about = "List archived captures of a URL",
    long_about = "List the Wayback Machine captures of a URL, newest first, as recorded in the
CDX index. Listed captures are not played back, so some of them may turn out
to be unplayable.",
    help_template = crate::clap_help!(
        examples: "  # All captures\n  \
                   {bin} search https://example.com/\n\n  \
                   # Ten most recent, as JSON\n  \
                   {bin} search --limit 10 --json https://example.com/"
    )
)]
pub struct SearchCommand {
    /// URL to look up
    #[arg(value_hint = ValueHint::Url)]
    pub url: String,

    /// Only list the N most recent captures
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Emit JSON array instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: SearchCommand, settings: Settings) -> Result<()> {
    runtime()?.block_on(run_async(cmd, settings))
}

async fn run_async(cmd: SearchCommand, settings: Settings) -> Result<()> {
    let mut options = settings.client_options();
    options.search_limit = cmd.limit;
    let client = WaybackClient::new(options)?;

    let records = client.search(&cmd.url).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        eprintln!("No captures of {}", cmd.url);
        return Ok(());
    }

    println!("{:<14}  {:<23}  {:>6}  {:<24}  URL", "TIMESTAMP", "CAPTURED", "STATUS", "TYPE");
    for record in &records {
        let status = record
            .status_code
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14}  {:<23}  {:>6}  {:<24}  {}",
            record.timestamp,
            format_time(record.captured_at()),
            status,
            truncate(&record.mime_type, 24),
            record.url
        );
    }
    eprintln!("{} capture(s)", records.len());

    Ok(())
}
