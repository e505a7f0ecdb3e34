use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{DEFAULT_SESSION_FILE, DEFAULT_SHELF, ExtractStrategy};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape every book on a Goodreads shelf.
    Scrape(ScrapeArgs),
    /// Look up where an author was born.
    Author(AuthorArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// Headless Chromium over the DevTools protocol.
    Chrome,
    /// Plain HTTP fetch of the rendered page (no scripts run).
    Http,
}

#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Browser engine used to load pages.
    #[arg(long, value_enum, default_value_t = Engine::Chrome)]
    pub engine: Engine,

    /// Show the browser window (chrome engine only).
    #[arg(long)]
    pub headed: bool,
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Goodreads profile URL (`/user/show/<id>`) or shelf URL (`/review/list/<id>`).
    #[arg(long)]
    pub url: String,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// How rows are read from the page.
    #[arg(long, value_enum, default_value_t = ExtractStrategy::PerItem)]
    pub strategy: ExtractStrategy,

    /// Shelf name used for derived shelf and page URLs.
    #[arg(long, default_value = DEFAULT_SHELF)]
    pub shelf: String,

    /// Sign in before scraping (credentials from GR_LOGIN / GR_PASSWORD).
    #[arg(long)]
    pub login: bool,

    /// Cookie file used to persist the signed-in session.
    #[arg(long, default_value = DEFAULT_SESSION_FILE)]
    pub session_file: String,

    /// Write JSON Lines to this new file instead of a JSON array to stdout.
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Args)]
pub struct AuthorArgs {
    /// Goodreads author page URL.
    #[arg(long)]
    pub url: String,

    #[command(flatten)]
    pub engine: EngineArgs,
}
