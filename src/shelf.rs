use url::Url;

use crate::browser::{ShelfBrowser, poll_until};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::extract::{BOOK_ROW, read_books};
use crate::formats::BookRecord;
use crate::status::{LoadStatus, parse_load_status};

pub const INFINITE_STATUS: &str = "#infiniteStatus";
pub const PAGINATION: &str = "#reviewPagination";
pub const PAGINATION_LINKS: &str = "#reviewPagination a";
const LOGIN_MODAL: &str = ".loginModal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfMode {
    InfiniteScroll(LoadStatus),
    Paginated { last_page: u32 },
    SinglePage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShelfLoadState {
    pub loaded_count: u32,
    pub total_count: u32,
    /// `.bookalike` rows present in the DOM after the last step.
    pub rendered: usize,
}

impl ShelfLoadState {
    pub fn new(status: LoadStatus, rendered: usize) -> Self {
        Self {
            loaded_count: status.loaded,
            total_count: status.total,
            rendered,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.loaded_count >= self.total_count
    }

    pub fn advance(&mut self, status: LoadStatus, rendered: usize) {
        debug_assert!(rendered > self.rendered);
        self.loaded_count = status.loaded;
        self.total_count = status.total;
        self.rendered = rendered;
    }
}

/// Page number to stop at: the control ends with a "next" link, so the last
/// page number is the second-to-last anchor.
pub fn last_page_from_links(links: &[String]) -> Result<u32, ScrapeError> {
    let malformed = || ScrapeError::MalformedPagination(links.to_vec());
    let [.., last_page, _next] = links else {
        return Err(malformed());
    };
    last_page.trim().parse().map_err(|_| malformed())
}

pub async fn wait_for_page(browser: &dyn ShelfBrowser, config: &ScrapeConfig) -> Result<(), ScrapeError> {
    let timeouts = &config.timeouts;

    poll_until(timeouts.page_ready, timeouts.poll_interval, move || async move {
        Ok(browser.is_ready().await?.then_some(()))
    })
    .await?
    .ok_or_else(|| ScrapeError::timeout("document ready state", timeouts.page_ready))?;

    poll_until(timeouts.body, timeouts.poll_interval, move || async move {
        Ok((browser.count("body").await? > 0).then_some(()))
    })
    .await?
    .ok_or_else(|| ScrapeError::timeout("page body", timeouts.body))?;

    if browser.count(LOGIN_MODAL).await? > 0 {
        tracing::debug!("dismissing login modal");
        browser.click_at(10.0, 100.0).await?;
    }
    Ok(())
}

async fn probe_load_status(
    browser: &dyn ShelfBrowser,
    config: &ScrapeConfig,
) -> Result<Option<LoadStatus>, ScrapeError> {
    let timeouts = &config.timeouts;
    let text = poll_until(timeouts.status_probe, timeouts.poll_interval, move || async move {
        browser.text(INFINITE_STATUS).await
    })
    .await?;

    match text {
        Some(text) if !text.trim().is_empty() => parse_load_status(&text).map(Some),
        Some(_) => {
            tracing::debug!("load indicator is empty");
            Ok(None)
        }
        None => {
            tracing::debug!(waited = ?timeouts.status_probe, "no load indicator");
            Ok(None)
        }
    }
}

async fn probe_pagination(
    browser: &dyn ShelfBrowser,
    config: &ScrapeConfig,
) -> Result<ShelfMode, ScrapeError> {
    let timeouts = &config.timeouts;
    let found = poll_until(timeouts.pagination_probe, timeouts.poll_interval, move || async move {
        Ok((browser.count(PAGINATION).await? > 0).then_some(()))
    })
    .await?;

    if found.is_none() {
        return Ok(ShelfMode::SinglePage);
    }
    let links = browser.texts(PAGINATION_LINKS).await?;
    let last_page = last_page_from_links(&links)?;
    Ok(ShelfMode::Paginated { last_page })
}

async fn scroll_until_loaded(
    browser: &dyn ShelfBrowser,
    config: &ScrapeConfig,
    status: LoadStatus,
) -> Result<ShelfLoadState, ScrapeError> {
    let timeouts = &config.timeouts;
    let mut state = ShelfLoadState::new(status, browser.count(BOOK_ROW).await?);

    while !state.is_complete() {
        browser.scroll_to_end().await?;

        let previous = state.rendered;
        let rendered = poll_until(timeouts.scroll_progress, timeouts.poll_interval, move || async move {
            let rendered = browser.count(BOOK_ROW).await?;
            Ok((rendered > previous).then_some(rendered))
        })
        .await?
        .ok_or_else(|| ScrapeError::timeout("more books after scrolling", timeouts.scroll_progress))?;

        let text = poll_until(timeouts.status_refresh, timeouts.poll_interval, move || async move {
            browser.text(INFINITE_STATUS).await
        })
        .await?
        .ok_or_else(|| ScrapeError::timeout("load indicator", timeouts.status_refresh))?;

        state.advance(parse_load_status(&text)?, rendered);
        tracing::debug!(
            loaded = state.loaded_count,
            total = state.total_count,
            rendered = state.rendered,
            "scrolled shelf"
        );
    }

    Ok(state)
}

async fn load_infinite(
    browser: &dyn ShelfBrowser,
    config: &ScrapeConfig,
    status: LoadStatus,
) -> Result<Vec<BookRecord>, ScrapeError> {
    let state = scroll_until_loaded(browser, config, status).await?;
    let books = read_books(browser, config.strategy).await?;
    tracing::debug!(books = books.len(), total = state.total_count, "read scrolled shelf");
    Ok(books)
}

async fn load_paginated(
    browser: &dyn ShelfBrowser,
    config: &ScrapeConfig,
    shelf_url: &Url,
    last_page: u32,
    mut books: Vec<BookRecord>,
) -> Result<Vec<BookRecord>, ScrapeError> {
    for page in 2..=last_page {
        let url = crate::urls::pagination_url(shelf_url, page, &config.shelf);
        tracing::info!(page, last_page, url = %url, "loading shelf page");
        browser.goto(&url).await?;
        wait_for_page(browser, config).await?;
        books.extend(read_books(browser, config.strategy).await?);
    }
    Ok(books)
}

/// Loads `shelf_url` and returns every book on the shelf, in page/scroll order.
pub async fn scrape_shelf(
    browser: &dyn ShelfBrowser,
    shelf_url: &Url,
    config: &ScrapeConfig,
) -> Result<Vec<BookRecord>, ScrapeError> {
    tracing::info!(url = %shelf_url, engine = browser.engine(), "loading shelf");
    browser.goto(shelf_url).await?;
    wait_for_page(browser, config).await?;

    let (mode, first_page) = match probe_load_status(browser, config).await? {
        Some(status) => (ShelfMode::InfiniteScroll(status), Vec::new()),
        None => {
            // Rows of the first page are kept whatever the pagination probe finds.
            let first_page = read_books(browser, config.strategy).await?;
            (probe_pagination(browser, config).await?, first_page)
        }
    };
    tracing::info!(?mode, "shelf mode");

    let books = match mode {
        ShelfMode::InfiniteScroll(status) => load_infinite(browser, config, status).await?,
        ShelfMode::Paginated { last_page } => {
            load_paginated(browser, config, shelf_url, last_page, first_page).await?
        }
        ShelfMode::SinglePage => first_page,
    };

    tracing::info!(books = books.len(), "shelf loaded");
    Ok(books)
}
