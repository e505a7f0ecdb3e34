use std::io::Write as _;

use anyhow::Context as _;
use url::Url;

use crate::browser::{ShelfBrowser, poll_until};
use crate::cli::AuthorArgs;
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::formats::AuthorOrigin;
use crate::shelf::wait_for_page;

const DATA_TITLE: &str = "div.dataTitle";
const BORN_LABEL: &str = "Born";

/// Country part of a birthplace: text after the last comma, without a leading
/// "The ".
pub fn cleanup_birthplace(birthplace: Option<&str>) -> Option<String> {
    let birthplace = birthplace.filter(|b| !b.is_empty())?;
    let country = birthplace.rsplit(',').next().unwrap_or(birthplace).trim();
    Some(country.strip_prefix("The ").unwrap_or(country).to_owned())
}

fn strip_locale_preposition(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix("in ").unwrap_or(text).trim().to_owned()
}

/// Reads the "Born" entry of an author page.
pub async fn scrape_author(
    browser: &dyn ShelfBrowser,
    author_url: &Url,
    config: &ScrapeConfig,
) -> Result<AuthorOrigin, ScrapeError> {
    tracing::info!(url = %author_url, "loading author page");
    browser.goto(author_url).await?;
    wait_for_page(browser, config).await?;

    let timeouts = &config.timeouts;
    let born = poll_until(timeouts.author_probe, timeouts.poll_interval, move || async move {
        browser.labeled_value(DATA_TITLE, BORN_LABEL).await
    })
    .await?;

    let birthplace = born
        .as_deref()
        .map(strip_locale_preposition)
        .filter(|b| !b.is_empty());
    if birthplace.is_none() {
        tracing::debug!(url = %author_url, "no birthplace on author page");
    }
    let country = cleanup_birthplace(birthplace.as_deref());

    Ok(AuthorOrigin {
        birthplace,
        country,
    })
}

pub async fn run(args: AuthorArgs) -> anyhow::Result<()> {
    let url = Url::parse(args.url.trim()).with_context(|| format!("parse author url: {}", args.url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("author url must be http/https: {url}");
    }

    let config = ScrapeConfig::default();
    let browser = crate::scrape::launch_engine(&args.engine)
        .await
        .context("launch browser")?;
    let result = scrape_author(browser.as_ref(), &url, &config).await;
    let origin = crate::scrape::close_after(browser.as_ref(), result)
        .await
        .with_context(|| format!("look up author {url}"))?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &origin).context("serialize author origin")?;
    writeln!(stdout).context("write stdout")?;
    Ok(())
}
