use std::fs::OpenOptions;
use std::future::Future;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::auth::authenticate;
use crate::browser::ShelfBrowser;
use crate::chrome::ChromeBrowser;
use crate::cli::{Engine, EngineArgs, ScrapeArgs};
use crate::config::{AuthConfig, ChromeOptions, ScrapeConfig};
use crate::error::{DriverError, ScrapeError};
use crate::formats::BookRecord;
use crate::shelf::scrape_shelf;
use crate::snapshot::SnapshotBrowser;
use crate::urls::{ShelfTarget, resolve_shelf_url};

pub async fn launch_engine(args: &EngineArgs) -> Result<Box<dyn ShelfBrowser>, DriverError> {
    match args.engine {
        Engine::Chrome => {
            let options = ChromeOptions {
                headless: !args.headed,
                ..ChromeOptions::default()
            };
            Ok(Box::new(ChromeBrowser::launch(&options).await?))
        }
        Engine::Http => Ok(Box::new(SnapshotBrowser::new()?)),
    }
}

/// Closes `browser` and hands back `result`. A close failure only surfaces
/// when the work itself succeeded.
pub async fn close_after<T>(
    browser: &dyn ShelfBrowser,
    result: Result<T, ScrapeError>,
) -> Result<T, ScrapeError> {
    let closed = browser.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!(%close_err, "close browser after failed scrape");
            Err(err)
        }
    }
}

pub async fn scrape_target(
    browser: &dyn ShelfBrowser,
    target: &ShelfTarget,
    auth: Option<&AuthConfig>,
    config: &ScrapeConfig,
) -> Result<Vec<BookRecord>, ScrapeError> {
    if let Some(auth) = auth {
        authenticate(browser, target.url(), auth, config).await?;
    }
    scrape_shelf(browser, target.url(), config).await
}

pub async fn scrape<L, Fut>(
    target: &ShelfTarget,
    auth: Option<&AuthConfig>,
    config: &ScrapeConfig,
    launch: L,
) -> Result<Vec<BookRecord>, ScrapeError>
where
    L: FnOnce() -> Fut,
    Fut: Future<Output = Result<Box<dyn ShelfBrowser>, DriverError>>,
{
    let browser = launch().await?;
    let result = scrape_target(browser.as_ref(), target, auth, config).await;
    close_after(browser.as_ref(), result).await
}

fn write_jsonl(path: &Path, books: &[BookRecord]) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create output: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for book in books {
        serde_json::to_writer(&mut out, book).context("serialize book record")?;
        out.write_all(b"\n").context("write newline")?;
    }
    out.flush().context("flush output")?;
    Ok(())
}

fn write_stdout(books: &[BookRecord]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, books).context("serialize books")?;
    writeln!(stdout).context("write stdout")?;
    Ok(())
}

pub async fn run(args: ScrapeArgs) -> anyhow::Result<()> {
    let config = ScrapeConfig {
        strategy: args.strategy,
        shelf: args.shelf.clone(),
        ..ScrapeConfig::default()
    };
    let target = resolve_shelf_url(&args.url, &config.shelf)?;
    tracing::info!(target = %target, "resolved shelf");

    let out_path = args.out.as_ref().map(PathBuf::from);
    if let Some(path) = &out_path {
        if path.exists() {
            anyhow::bail!("output already exists: {}", path.display());
        }
    }

    let auth = if args.login {
        Some(AuthConfig::from_env(&args.session_file)?)
    } else {
        None
    };

    let books = scrape(&target, auth.as_ref(), &config, || launch_engine(&args.engine))
        .await
        .with_context(|| format!("scrape {target}"))?;

    match &out_path {
        Some(path) => {
            write_jsonl(path, &books)?;
            tracing::info!(books = books.len(), out = %path.display(), "wrote books");
        }
        None => write_stdout(&books)?,
    }
    Ok(())
}
