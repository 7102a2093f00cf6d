use anyhow::Result;
use clap::{Args, ValueHint};
use serde_json::json;
use wayback_fallback::{
    constants, Downloader, FallbackMiddleware, Fetched, HttpResponse, Request, Settings,
};

use super::utils::{format_time, runtime};

#[derive(Args, Debug)]
#[command(
    about = "Fetch a URL, falling back to the Wayback Machine",
    long_about = "Fetch a URL the way a crawler would.

When the live response is an HTTP error (400 and above) the newest playable
Wayback Machine capture is returned instead. With --proxy the archive is asked
first and the origin is only contacted when no capture can be played back;
add --no-fallthrough to fail rather than go live in that case.

--earlier walks back from the served capture to older ones.",
    help_template = crate::clap_help!(
        examples: "  # Fetch with archive fallback on errors\n  \
                   {bin} fetch https://example.com/\n\n  \
                   # Archive only, never contact the origin\n  \
                   {bin} fetch --proxy --no-fallthrough https://example.com/\n\n  \
                   # Second-newest playable capture, as JSON\n  \
                   {bin} fetch --proxy --earlier 1 --json https://example.com/"
    )
)]
pub struct FetchCommand {
    /// URL to fetch
    #[arg(value_hint = ValueHint::Url)]
    pub url: String,

    /// Try the archive before the live origin
    #[arg(long)]
    pub proxy: bool,

    /// With --proxy, abandon the request when the archive has nothing
    #[arg(long, requires = "proxy")]
    pub no_fallthrough: bool,

    /// Keep live error responses as they are
    #[arg(long)]
    pub no_fallback: bool,

    /// Step back this many playable captures from the one served
    #[arg(long, default_value = "0")]
    pub earlier: usize,

    /// Print the response body after the summary
    #[arg(long)]
    pub body: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: FetchCommand, settings: Settings) -> Result<()> {
    runtime()?.block_on(run_async(cmd, settings))
}

async fn run_async(cmd: FetchCommand, settings: Settings) -> Result<()> {
    let middleware = FallbackMiddleware::on_start(settings)?;
    let downloader = Downloader::new(middleware)?;

    let request = build_request(&cmd);
    let mut fetched = downloader.fetch(&request).await?;

    if cmd.earlier > 0 {
        let Fetched::Archived(mut archived) = fetched else {
            anyhow::bail!("--earlier needs an archived response, but {} was served live", cmd.url);
        };
        for step in 1..=cmd.earlier {
            archived = match archived.earlier().await {
                Some(older) => older,
                None => anyhow::bail!(
                    "Only {} older playable capture(s) of {} exist",
                    step - 1,
                    cmd.url
                ),
            };
        }
        fetched = Fetched::Archived(archived);
    }

    if cmd.json {
        print_json(&fetched)?;
    } else {
        print_summary(&fetched);
    }

    if cmd.body {
        println!();
        print!("{}", fetched.text());
    }

    Ok(())
}

/// Command-line switches become per-request overrides
fn build_request(cmd: &FetchCommand) -> Request {
    let mut request = Request::new(&cmd.url);
    if cmd.proxy {
        request = request.with_meta(constants::META_PROXY_ENABLED, true);
    }
    if cmd.no_fallthrough {
        request = request.with_meta(constants::META_PROXY_FALLTHROUGH_ENABLED, false);
    }
    if cmd.no_fallback {
        request = request.with_meta(constants::META_FALLBACK_ENABLED, false);
    }
    request
}

fn print_summary(fetched: &Fetched) {
    println!("URL:       {}", fetched.url());
    println!("Status:    {}", fetched.status());

    match fetched {
        Fetched::Live(_) => println!("Source:    live"),
        Fetched::Archived(archived) => {
            match archived.original_response() {
                Some(original) => println!("Source:    archive (replaced {})", original.status),
                None => println!("Source:    archive (proxy)"),
            }
            println!("Captured:  {}", format_time(archived.timestamp()));
            println!("Memento:   {}", archived.wayback_url());
            println!("Older:     {} candidate(s)", archived.remaining().len());
        }
    }
}

fn print_json(fetched: &Fetched) -> Result<()> {
    let summary = match fetched {
        Fetched::Live(live) => json!({
            "url": live.url,
            "status": live.status.as_u16(),
            "source": "live",
            "bytes": live.body.len(),
        }),
        Fetched::Archived(archived) => json!({
            "url": archived.url(),
            "status": archived.status().as_u16(),
            "source": "archive",
            "original_status": archived.original_response().map(|r| r.status.as_u16()),
            "timestamp": archived.timestamp(),
            "wayback_url": archived.try_wayback_url(),
            "encoding": archived.encoding(),
            "remaining": archived.remaining().len(),
            "bytes": archived.body().len(),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
