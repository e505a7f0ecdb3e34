use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::ScrapeError;

static GOODREADS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://www\.goodreads\.com/.*$").expect("static goodreads url regex")
});

static PROFILE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.goodreads\.com/user/show/(\d+)(-\w+)*$")
        .expect("static profile url regex")
});

static SHELF_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.goodreads\.com/review/list/\d+.*$").expect("static shelf url regex")
});

/// A shelf URL that passed validation. Only [`resolve_shelf_url`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfTarget(Url);

impl ShelfTarget {
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl std::fmt::Display for ShelfTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

pub fn is_valid_goodreads_url(url: &str) -> bool {
    if url.chars().any(char::is_whitespace) {
        return false;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if parsed.host_str().is_none() {
        return false;
    }
    GOODREADS_URL.is_match(url)
}

pub fn is_goodreads_profile(url: &str) -> bool {
    PROFILE_URL.is_match(url) && is_valid_goodreads_url(url)
}

pub fn is_goodreads_shelf(url: &str) -> bool {
    SHELF_URL.is_match(url) && is_valid_goodreads_url(url)
}

/// Profile URL -> `/review/list/<id>?shelf=<shelf>` on the same origin.
pub fn create_shelf_url(profile_url: &str, shelf: &str) -> Result<Url, ScrapeError> {
    let user_id = PROFILE_URL
        .captures(profile_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .ok_or_else(|| ScrapeError::InvalidUrl(profile_url.to_owned()))?;

    let mut url =
        Url::parse(profile_url).map_err(|_| ScrapeError::InvalidUrl(profile_url.to_owned()))?;
    url.set_path(&format!("/review/list/{user_id}"));
    url.set_query(Some(&format!("shelf={shelf}")));
    url.set_fragment(None);
    Ok(url)
}

/// Same scheme, host and path as `shelf_url`; query replaced with `page=<n>&shelf=<shelf>`.
pub fn pagination_url(shelf_url: &Url, page: u32, shelf: &str) -> Url {
    let mut url = shelf_url.clone();
    url.set_query(Some(&format!("page={page}&shelf={shelf}")));
    url.set_fragment(None);
    url
}

pub fn resolve_shelf_url(input: &str, shelf: &str) -> Result<ShelfTarget, ScrapeError> {
    let input = input.trim();
    if is_goodreads_profile(input) {
        return create_shelf_url(input, shelf).map(ShelfTarget);
    }
    if is_goodreads_shelf(input) {
        let url = Url::parse(input).map_err(|_| ScrapeError::InvalidUrl(input.to_owned()))?;
        return Ok(ShelfTarget(url));
    }
    Err(ScrapeError::InvalidUrl(input.to_owned()))
}

/// Numeric prefix of the last path segment, e.g. `13579` for
/// `/author/show/13579.Author-Name`.
pub fn author_id_str(author_url: &str) -> Option<String> {
    let url = Url::parse(author_url).ok()?;
    let last = url.path_segments()?.next_back()?;
    let id = last.split('.').next()?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(id.to_owned())
}

pub fn author_id(author_url: &str) -> Option<u64> {
    author_id_str(author_url)?.parse().ok()
}

pub fn is_sign_in_page(url: &Url) -> bool {
    url.as_str().contains("sign_in")
}
