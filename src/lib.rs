// src/lib.rs
//! Serve crawler requests from the Wayback Machine.
//!
//! [`FallbackMiddleware`] sits in a crawler's download pipeline. In proxy mode it answers GET
//! requests from the newest playable archive capture before going live; in fallback mode it
//! replaces live HTTP error responses with one. Either way the stand-in is an
//! [`ArchivedResponse`] that can walk back to older captures with
//! [`ArchivedResponse::earlier`].
//!
//! ```no_run
//! use wayback_fallback::{Downloader, FallbackMiddleware, HttpResponse, Request, Settings};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let middleware = FallbackMiddleware::on_start(Settings::default())?;
//! let downloader = Downloader::new(middleware)?;
//! let fetched = downloader.fetch(&Request::new("https://example.com/")).await?;
//! if let Some(archived) = fetched.as_archived() {
//!     println!("served from {}", archived.wayback_url());
//! }
//! println!("{}", fetched.status());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod http;
pub mod middleware;
pub mod resolver;
pub mod response;
pub mod settings;
pub mod snapshot;

pub use client::{ArchiveClient, ClientOptions, ClientOptionsBuilder, WaybackClient};
pub use downloader::Downloader;
pub use error::{ArchiveError, FallbackError};
pub use http::{HttpResponse, Meta, Request, Response};
pub use middleware::{FallbackMiddleware, Fetched};
pub use resolver::{resolve, Resolution};
pub use response::{ArchivedResponse, History};
pub use settings::{resolve_flag, Flag, Settings};
pub use snapshot::{CdxRecord, Mode, Snapshot};
