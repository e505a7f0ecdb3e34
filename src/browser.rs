use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::DriverError;
use crate::formats::StoredCookie;

#[async_trait]
pub trait ItemNode: Send + Sync {
    async fn visible_text(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Trimmed `textContent` of the first match, including nodes hidden with
    /// `display: none`.
    async fn hidden_text(&self, selector: &str) -> Result<Option<String>, DriverError>;

    async fn link_href(&self, selector: &str) -> Result<Option<String>, DriverError>;
}

/// The single browser session a scrape owns.
#[async_trait]
pub trait ShelfBrowser: Send + Sync {
    fn engine(&self) -> &'static str;

    async fn goto(&self, url: &Url) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<Url, DriverError>;

    async fn is_ready(&self) -> Result<bool, DriverError>;

    async fn count(&self, selector: &str) -> Result<usize, DriverError>;

    /// Visible text of the first match, or `None` when nothing matches.
    async fn text(&self, selector: &str) -> Result<Option<String>, DriverError>;

    async fn texts(&self, selector: &str) -> Result<Vec<String>, DriverError>;

    /// Text of the element right after the first `label_selector` match whose
    /// text equals `label`.
    async fn labeled_value(
        &self,
        label_selector: &str,
        label: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn items(&self, selector: &str) -> Result<Vec<Box<dyn ItemNode>>, DriverError>;

    async fn scroll_to_end(&self) -> Result<(), DriverError>;

    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Clicks the first `tag` element whose visible text contains `text`.
    async fn click_text(&self, tag: &str, text: &str) -> Result<(), DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    async fn cookies(&self) -> Result<Vec<StoredCookie>, DriverError>;

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// Repeats `probe` every `interval` until it yields a value or `budget` runs
/// out. A timeout is `Ok(None)`; the caller decides whether it is fatal.
pub async fn poll_until<T, F, Fut>(
    budget: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<Option<T>, DriverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, DriverError>>,
{
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(interval).await;
    }
}
