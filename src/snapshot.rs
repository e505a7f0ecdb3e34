use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::cookie::{CookieStore as _, Jar};
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::browser::{ItemNode, ShelfBrowser};
use crate::error::DriverError;
use crate::formats::StoredCookie;

const ENGINE: &str = "http";

/// Elements never rendered: the shelf stylesheet hides the per-cell labels.
const HIDDEN_TAGS: [&str; 5] = ["label", "script", "style", "template", "noscript"];
const BLOCK_TAGS: [&str; 8] = ["div", "p", "br", "td", "th", "tr", "li", "nobr"];

#[derive(Debug, Clone)]
struct LoadedPage {
    url: Url,
    html: String,
}

pub struct SnapshotBrowser {
    client: reqwest::Client,
    jar: Arc<Jar>,
    page: Mutex<Option<LoadedPage>>,
}

impl SnapshotBrowser {
    pub fn new() -> Result<Self, DriverError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|err| DriverError::Command(format!("build http client: {err}")))?;
        Ok(Self {
            client,
            jar,
            page: Mutex::new(None),
        })
    }

    fn loaded(&self) -> Result<LoadedPage, DriverError> {
        self.page
            .lock()
            .map_err(|_| DriverError::Command("page state poisoned".to_owned()))?
            .clone()
            .ok_or_else(|| DriverError::Command("no page loaded".to_owned()))
    }

    fn with_document<T>(&self, f: impl FnOnce(&Html, &Url) -> Result<T, DriverError>) -> Result<T, DriverError> {
        let page = self.loaded()?;
        let document = Html::parse_document(&page.html);
        f(&document, &page.url)
    }

    async fn fetch(&self, url: &Url) -> Result<LoadedPage, DriverError> {
        if url.scheme() == "file" {
            let path = url.to_file_path().map_err(|_| DriverError::Fetch {
                url: url.to_string(),
                message: "not a local file path".to_owned(),
            })?;
            let html = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| DriverError::Fetch {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            return Ok(LoadedPage {
                url: url.clone(),
                html,
            });
        }

        let fetch_error = |err: reqwest::Error| DriverError::Fetch {
            url: url.to_string(),
            message: err.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, "shelfscrape/0.1")
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Fetch {
                url: url.to_string(),
                message: format!("http status {status}"),
            });
        }
        let final_url = response.url().clone();
        let html = response.text().await.map_err(fetch_error)?;
        Ok(LoadedPage {
            url: final_url,
            html,
        })
    }
}

/// `Set-Cookie` form of a stored cookie and the origin it is set from. A
/// leading dot on the domain marks a domain cookie, otherwise it is host-only.
/// Expired cookies yield `None`.
fn set_cookie_line(cookie: &StoredCookie, fallback: Option<&Url>, now: f64) -> Option<(String, Url)> {
    let max_age = match cookie.expiry {
        Some(expiry) if expiry <= now => return None,
        Some(expiry) => Some((expiry - now).ceil() as u64),
        None => None,
    };

    let origin = match cookie.domain.as_deref() {
        Some(domain) => Url::parse(&format!("https://{}/", domain.trim_start_matches('.'))).ok()?,
        None => fallback?.clone(),
    };

    let mut line = format!(
        "{}={}; Path={}",
        cookie.name,
        cookie.value,
        cookie.path.as_deref().unwrap_or("/")
    );
    if let Some(domain) = cookie.domain.as_deref().filter(|domain| domain.starts_with('.')) {
        line.push_str(&format!("; Domain={domain}"));
    }
    if let Some(max_age) = max_age {
        line.push_str(&format!("; Max-Age={max_age}"));
    }
    if cookie.secure {
        line.push_str("; Secure");
    }
    if cookie.http_only {
        line.push_str("; HttpOnly");
    }
    Some((line, origin))
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector)
        .map_err(|err| DriverError::Command(format!("invalid selector `{selector}`: {err}")))
}

fn is_hidden(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if HIDDEN_TAGS.contains(&value.name()) || value.attr("hidden").is_some() {
        return true;
    }
    value
        .attr("style")
        .map(|style| {
            style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase()
                .contains("display:none")
        })
        .unwrap_or(false)
}

fn collect_visible(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if is_hidden(&child_element) {
                continue;
            }
            collect_visible(child_element, out);
            if BLOCK_TAGS.contains(&child_element.value().name()) {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Rendered text of `element`, whitespace collapsed. Descendants hidden by
/// markup are skipped; the element itself is read even when hidden.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_visible(element, &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn absolute_href(element: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = element.value().attr("href")?;
    base.join(href).ok().map(|url| url.to_string())
}

fn element_document(tag: &str, html: &str) -> Html {
    match tag {
        "tr" => Html::parse_document(&format!("<table><tbody>{html}</tbody></table>")),
        "td" | "th" => Html::parse_document(&format!("<table><tbody><tr>{html}</tr></tbody></table>")),
        "tbody" | "thead" | "tfoot" => Html::parse_document(&format!("<table>{html}</table>")),
        _ => Html::parse_fragment(html),
    }
}

struct SnapshotItem {
    tag: String,
    html: String,
    base: Url,
}

impl SnapshotItem {
    fn first<T>(&self, selector: &str, f: impl FnOnce(ElementRef<'_>) -> Option<T>) -> Result<Option<T>, DriverError> {
        let selector = parse_selector(selector)?;
        let document = element_document(&self.tag, &self.html);
        Ok(document.select(&selector).next().and_then(f))
    }
}

#[async_trait]
impl ItemNode for SnapshotItem {
    async fn visible_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.first(selector, |element| Some(visible_text(element)))
    }

    async fn hidden_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.first(selector, |element| Some(text_content(element)))
    }

    async fn link_href(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.first(selector, |element| absolute_href(element, &self.base))
    }
}

#[async_trait]
impl ShelfBrowser for SnapshotBrowser {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn goto(&self, url: &Url) -> Result<(), DriverError> {
        let page = self.fetch(url).await?;
        tracing::debug!(url = %page.url, bytes = page.html.len(), "fetched page");
        *self
            .page
            .lock()
            .map_err(|_| DriverError::Command("page state poisoned".to_owned()))? = Some(page);
        Ok(())
    }

    async fn current_url(&self) -> Result<Url, DriverError> {
        Ok(self.loaded()?.url)
    }

    async fn is_ready(&self) -> Result<bool, DriverError> {
        Ok(self
            .page
            .lock()
            .map_err(|_| DriverError::Command("page state poisoned".to_owned()))?
            .is_some())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let selector = parse_selector(selector)?;
        self.with_document(|document, _| Ok(document.select(&selector).count()))
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let selector = parse_selector(selector)?;
        self.with_document(|document, _| Ok(document.select(&selector).next().map(visible_text)))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        let selector = parse_selector(selector)?;
        self.with_document(|document, _| Ok(document.select(&selector).map(visible_text).collect()))
    }

    async fn labeled_value(
        &self,
        label_selector: &str,
        label: &str,
    ) -> Result<Option<String>, DriverError> {
        let selector = parse_selector(label_selector)?;
        self.with_document(|document, _| {
            Ok(document
                .select(&selector)
                .find(|element| visible_text(*element) == label)
                .and_then(|element| element.next_siblings().find_map(ElementRef::wrap))
                .map(visible_text))
        })
    }

    async fn items(&self, selector: &str) -> Result<Vec<Box<dyn ItemNode>>, DriverError> {
        let selector = parse_selector(selector)?;
        self.with_document(|document, base| {
            Ok(document
                .select(&selector)
                .map(|element| {
                    Box::new(SnapshotItem {
                        tag: element.value().name().to_owned(),
                        html: element.html(),
                        base: base.clone(),
                    }) as Box<dyn ItemNode>
                })
                .collect())
        })
    }

    async fn scroll_to_end(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click_at(&self, _x: f64, _y: f64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), DriverError> {
        Err(DriverError::Unsupported {
            engine: ENGINE,
            operation: "clicking",
        })
    }

    async fn click_text(&self, _tag: &str, _text: &str) -> Result<(), DriverError> {
        Err(DriverError::Unsupported {
            engine: ENGINE,
            operation: "clicking",
        })
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<(), DriverError> {
        Err(DriverError::Unsupported {
            engine: ENGINE,
            operation: "form input",
        })
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Err(DriverError::Unsupported {
            engine: ENGINE,
            operation: "scripts",
        })
    }

    // The jar only exposes what it would send to the open page, so attributes
    // are those of a host-only cookie for that page.
    async fn cookies(&self) -> Result<Vec<StoredCookie>, DriverError> {
        let Ok(page) = self.loaded() else {
            return Ok(Vec::new());
        };
        let Some(header) = self.jar.cookies(&page.url) else {
            return Ok(Vec::new());
        };
        let header = header
            .to_str()
            .map_err(|err| DriverError::Command(format!("cookie header: {err}")))?;
        Ok(header
            .split("; ")
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| StoredCookie {
                name: name.to_owned(),
                value: value.to_owned(),
                domain: page.url.host_str().map(str::to_owned),
                path: Some("/".to_owned()),
                secure: page.url.scheme() == "https",
                http_only: false,
                expiry: None,
            })
            .collect())
    }

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), DriverError> {
        let current = self.loaded().ok().map(|page| page.url);
        let now = unix_now();
        for cookie in cookies {
            match set_cookie_line(cookie, current.as_ref(), now) {
                Some((line, origin)) => self.jar.add_cookie_str(&line, &origin),
                None => tracing::debug!(name = %cookie.name, "skipping expired or unscoped cookie"),
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        if let Ok(mut page) = self.page.lock() {
            page.take();
        }
        Ok(())
    }
}
