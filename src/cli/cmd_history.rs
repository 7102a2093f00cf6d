use anyhow::Result;
use clap::{Args, ValueHint};
use serde_json::json;
use std::sync::Arc;
use wayback_fallback::{
    ArchiveClient, ArchivedResponse, HttpResponse, Request, Settings, WaybackClient,
};

use super::utils::{format_time, runtime};

#[derive(Args, Debug)]
#[command(
    about = "Walk back through playable captures of a URL",
    long_about = "Play back the captures of a URL from newest to oldest, listing only those
the archive can actually serve with status 200. Each capture is fetched once;
unplayable ones are skipped, and the walk stops early if the site is blocked.",
    help_template = crate::clap_help!(
        examples: "  # Every playable capture\n  \
                   {bin} history https://example.com/\n\n  \
                   # The three newest playable captures, as JSON lines\n  \
                   {bin} history --limit 3 --json https://example.com/"
    )
)]
pub struct HistoryCommand {
    /// URL to walk back through
    #[arg(value_hint = ValueHint::Url)]
    pub url: String,

    /// Stop after N playable captures
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Emit one JSON object per capture
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: HistoryCommand, settings: Settings) -> Result<()> {
    runtime()?.block_on(run_async(cmd, settings))
}

async fn run_async(cmd: HistoryCommand, settings: Settings) -> Result<()> {
    let client: Arc<dyn ArchiveClient> = Arc::new(WaybackClient::new(settings.client_options())?);

    let candidates = client.search(&cmd.url).await?;
    let total = candidates.len();
    log::info!("{} capture(s) of {} listed", total, cmd.url);

    let start = ArchivedResponse::new(Request::new(&cmd.url), candidates, None, client).await;
    let mut history = start.history();
    let mut shown = 0usize;

    while let Some(capture) = history.next().await {
        if cmd.json {
            let line = json!({
                "timestamp": capture.timestamp(),
                "wayback_url": capture.wayback_url(),
                "snapshot_url": capture.snapshot_url(),
                "bytes": capture.body().len(),
            });
            println!("{}", line);
        } else {
            println!(
                "{}  {}  ({} bytes)",
                format_time(capture.timestamp()),
                capture.wayback_url(),
                capture.body().len()
            );
        }

        shown += 1;
        if cmd.limit.is_some_and(|limit| shown >= limit) {
            break;
        }
    }

    if shown == 0 {
        eprintln!("No playable captures of {} (of {} listed)", cmd.url, total);
    }

    Ok(())
}
