use crate::browser::{ItemNode, ShelfBrowser};
use crate::config::ExtractStrategy;
use crate::error::{ExtractError, ScrapeError};
use crate::formats::{BookRecord, RawBook};

pub const BOOK_ROW: &str = ".bookalike";

const TITLE: &str = "td.field.title";
const ISBN: &str = "td.field.isbn div.value";
const ISBN13: &str = "td.field.isbn13 div.value";
const AUTHOR_LINK: &str = "td.field.author div.value a";
const AVG_RATING: &str = "td.field.avg_rating > div.value";
const USER_RATING: &str = "td.field.rating";
const NUM_PAGES: &str = "td.field.num_pages div.value";
const DATE_PUB: &str = "td.field.date_pub > div.value";
const DATE_STARTED: &str = "td.field.date_started > div.value";
const DATE_READ: &str = "td.field.date_read > div.value";
const DATE_ADDED: &str = "td.field.date_added > div.value";

const READ_BOOKS_SCRIPT: &str = include_str!("read_books.js");

const STARS: [(&str, u8); 5] = [
    ("did not like it", 1),
    ("it was ok", 2),
    ("liked it", 3),
    ("really liked it", 4),
    ("it was amazing", 5),
];

/// Maps the shelf's rating phrase to 1..=5. Unknown phrases (including "no
/// rating") are not an error.
pub fn stars_rating(text: &str) -> Option<u8> {
    let text = text.trim();
    STARS
        .iter()
        .find(|(phrase, _)| *phrase == text)
        .map(|(_, stars)| *stars)
}

pub fn extract_num_pages(text: &str) -> Option<u32> {
    text.split_whitespace()
        .find(|token| token.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|token| token.parse().ok())
}

fn required(value: Option<String>, field: &'static str, selector: &'static str) -> Result<String, ExtractError> {
    value.ok_or(ExtractError::MissingField { field, selector })
}

pub fn normalize(raw: RawBook) -> Result<BookRecord, ExtractError> {
    let title = required(raw.title, "title", TITLE)?;
    let avg_rating_text = required(raw.avg_rating, "avg_rating", AVG_RATING)?;
    let avg_rating = avg_rating_text
        .trim()
        .parse::<f64>()
        .map_err(|_| ExtractError::InvalidNumber {
            field: "avg_rating",
            value: avg_rating_text.clone(),
        })?;
    let user_rating = required(raw.user_rating, "user_rating", USER_RATING)?;
    let num_pages = required(raw.num_pages, "num_pages", NUM_PAGES)?;

    let author_link = raw.author_link.filter(|link| !link.trim().is_empty());
    let author_id = author_link.as_deref().and_then(crate::urls::author_id);

    Ok(BookRecord {
        title: title.trim().to_owned(),
        isbn: required(raw.isbn, "isbn", ISBN)?,
        isbn13: required(raw.isbn13, "isbn13", ISBN13)?,
        author_name: raw.author_name,
        author_id,
        author_link,
        avg_rating,
        user_rating: stars_rating(&user_rating),
        num_pages: extract_num_pages(&num_pages),
        publishing_date: required(raw.publishing_date, "publishing_date", DATE_PUB)?,
        started_date: required(raw.started_date, "started_date", DATE_STARTED)?,
        finished_date: required(raw.finished_date, "finished_date", DATE_READ)?,
        added_date: required(raw.added_date, "added_date", DATE_ADDED)?,
    })
}

/// Reads one row field by field.
///
/// Fields stored in hidden cells go through [`ItemNode::hidden_text`]: the
/// visible text of those cells repeats the label and value.
pub async fn read_item(item: &dyn ItemNode) -> Result<RawBook, ScrapeError> {
    Ok(RawBook {
        title: item.visible_text(TITLE).await?,
        isbn: item.hidden_text(ISBN).await?,
        isbn13: item.hidden_text(ISBN13).await?,
        author_name: item.visible_text(AUTHOR_LINK).await?,
        author_link: item.link_href(AUTHOR_LINK).await?,
        avg_rating: item.hidden_text(AVG_RATING).await?,
        user_rating: item.visible_text(USER_RATING).await?,
        num_pages: item.hidden_text(NUM_PAGES).await?,
        publishing_date: item.hidden_text(DATE_PUB).await?,
        started_date: item.hidden_text(DATE_STARTED).await?,
        finished_date: item.hidden_text(DATE_READ).await?,
        added_date: item.hidden_text(DATE_ADDED).await?,
    })
}

async fn read_raw_books(
    browser: &dyn ShelfBrowser,
    strategy: ExtractStrategy,
) -> Result<Vec<RawBook>, ScrapeError> {
    match strategy {
        ExtractStrategy::PerItem => {
            let items = browser.items(BOOK_ROW).await?;
            let mut raw = Vec::with_capacity(items.len());
            for item in &items {
                raw.push(read_item(item.as_ref()).await?);
            }
            Ok(raw)
        }
        ExtractStrategy::Batch => {
            let value = browser.evaluate(READ_BOOKS_SCRIPT).await?;
            let raw = serde_json::from_value::<Vec<RawBook>>(value)
                .map_err(crate::error::DriverError::from)?;
            Ok(raw)
        }
    }
}

pub async fn read_books(
    browser: &dyn ShelfBrowser,
    strategy: ExtractStrategy,
) -> Result<Vec<BookRecord>, ScrapeError> {
    let raw = read_raw_books(browser, strategy).await?;
    let books = raw
        .into_iter()
        .enumerate()
        .map(|(index, raw)| normalize(raw).map_err(|source| ScrapeError::Extract { index, source }))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(books = books.len(), ?strategy, "read shelf rows");
    Ok(books)
}
