use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::js::EvaluationResult;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use serde::de::DeserializeOwned;
use url::Url;

use crate::browser::{ItemNode, ShelfBrowser};
use crate::config::ChromeOptions;
use crate::error::DriverError;
use crate::formats::StoredCookie;

const ENGINE: &str = "chrome";

fn cdp_error(err: CdpError) -> DriverError {
    DriverError::Command(err.to_string())
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// CDP leaves `value` unset when a script returns `null`, so an absent value
/// decodes as JSON `null`.
fn decode_result<T: DeserializeOwned>(result: &EvaluationResult) -> Result<T, DriverError> {
    let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(value)?)
}

pub struct ChromeBrowser {
    browser: tokio::sync::Mutex<Browser>,
    page: Page,
    handler: tokio::task::JoinHandle<()>,
}

impl ChromeBrowser {
    pub async fn launch(options: &ChromeOptions) -> Result<Self, DriverError> {
        let (width, height) = options.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .no_sandbox()
            .arg(format!("--user-agent={}", options.user_agent));
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Command)?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(cdp_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(%err, "devtools handler event failed");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                if let Err(close_err) = browser.close().await {
                    tracing::debug!(%close_err, "close browser after failed launch");
                }
                if let Err(wait_err) = browser.wait().await {
                    tracing::debug!(%wait_err, "wait for browser exit");
                }
                handler.abort();
                return Err(cdp_error(err));
            }
        };
        tracing::info!(headless = options.headless, "browser launched");

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            page,
            handler,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> Result<T, DriverError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(DriverError::Command)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(cdp_error)?;
        decode_result(&result)
    }
}

impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

struct ChromeItem {
    element: Element,
}

impl ChromeItem {
    async fn first(&self, selector: &str) -> Result<Option<Element>, DriverError> {
        let mut found = self
            .element
            .find_elements(selector)
            .await
            .map_err(cdp_error)?;
        Ok((!found.is_empty()).then(|| found.swap_remove(0)))
    }

    async fn call_string(&self, selector: &str, function: &str) -> Result<Option<String>, DriverError> {
        let Some(element) = self.first(selector).await? else {
            return Ok(None);
        };
        let returned = element
            .call_js_fn(function, false)
            .await
            .map_err(cdp_error)?;
        Ok(returned
            .result
            .value
            .and_then(|value| value.as_str().map(str::to_owned)))
    }
}

#[async_trait]
impl ItemNode for ChromeItem {
    async fn visible_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let Some(element) = self.first(selector).await? else {
            return Ok(None);
        };
        let text = element.inner_text().await.map_err(cdp_error)?;
        Ok(Some(collapse_whitespace(&text.unwrap_or_default())))
    }

    async fn hidden_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.call_string(selector, "function() { return this.textContent.trim(); }")
            .await
    }

    async fn link_href(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.call_string(selector, "function() { return this.href; }")
            .await
    }
}

#[async_trait]
impl ShelfBrowser for ChromeBrowser {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn goto(&self, url: &Url) -> Result<(), DriverError> {
        self.page.goto(url.as_str()).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Url, DriverError> {
        let url = self
            .page
            .url()
            .await
            .map_err(cdp_error)?
            .ok_or_else(|| DriverError::Command("page has no url".to_owned()))?;
        Url::parse(&url).map_err(|err| DriverError::Command(format!("parse page url {url}: {err}")))
    }

    async fn is_ready(&self) -> Result<bool, DriverError> {
        let state = self.eval::<String>("document.readyState".to_owned()).await?;
        Ok(state == "complete")
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let count = self
            .eval::<u64>(format!(
                "document.querySelectorAll({}).length",
                js_string(selector)
            ))
            .await?;
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.eval(format!(
            "(() => {{ const n = document.querySelector({}); return n ? n.innerText : null; }})()",
            js_string(selector)
        ))
        .await
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).map((n) => n.innerText)",
            js_string(selector)
        ))
        .await
    }

    async fn labeled_value(
        &self,
        label_selector: &str,
        label: &str,
    ) -> Result<Option<String>, DriverError> {
        self.eval(format!(
            "(() => {{
                const label = Array.from(document.querySelectorAll({}))
                    .find((n) => n.innerText.trim() === {});
                const value = label ? label.nextElementSibling : null;
                return value ? value.innerText : null;
            }})()",
            js_string(label_selector),
            js_string(label)
        ))
        .await
    }

    async fn items(&self, selector: &str) -> Result<Vec<Box<dyn ItemNode>>, DriverError> {
        let elements = self.page.find_elements(selector).await.map_err(cdp_error)?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromeItem { element }) as Box<dyn ItemNode>)
            .collect())
    }

    async fn scroll_to_end(&self) -> Result<(), DriverError> {
        self.page
            .find_element("body")
            .await
            .map_err(cdp_error)?
            .press_key("End")
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError> {
        self.page.click(Point::new(x, y)).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::NotFound(selector.to_owned()))?
            .click()
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn click_text(&self, tag: &str, text: &str) -> Result<(), DriverError> {
        let clicked = self
            .eval::<bool>(format!(
                "(() => {{
                    const el = Array.from(document.querySelectorAll({}))
                        .find((n) => n.innerText.includes({}));
                    if (!el) return false;
                    el.click();
                    return true;
                }})()",
                js_string(tag),
                js_string(text)
            ))
            .await?;
        if !clicked {
            return Err(DriverError::NotFound(format!("{tag} containing {text:?}")));
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::NotFound(selector.to_owned()))?
            .click()
            .await
            .map_err(cdp_error)?
            .type_str(value)
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.eval(script.to_owned()).await
    }

    async fn cookies(&self) -> Result<Vec<StoredCookie>, DriverError> {
        let cookies = self.page.get_cookies().await.map_err(cdp_error)?;
        Ok(cookies
            .into_iter()
            .map(|cookie| StoredCookie {
                name: cookie.name,
                value: cookie.value,
                domain: Some(cookie.domain),
                path: Some(cookie.path),
                secure: cookie.secure,
                http_only: cookie.http_only,
                expiry: (cookie.expires > 0.0).then_some(cookie.expires),
            })
            .collect())
    }

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), DriverError> {
        let current = self.current_url().await.ok();
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            match (&cookie.domain, &current) {
                (Some(domain), _) => builder = builder.domain(domain.clone()),
                (None, Some(url)) => builder = builder.url(url.to_string()),
                (None, None) => {}
            }
            if let Some(path) = &cookie.path {
                builder = builder.path(path.clone());
            }
            if let Some(expiry) = cookie.expiry {
                builder = builder.expires(TimeSinceEpoch::new(expiry));
            }
            params.push(builder.build().map_err(DriverError::Command)?);
        }
        self.page.set_cookies(params).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(cdp_error)?;
        if let Err(err) = browser.wait().await {
            tracing::debug!(%err, "wait for browser exit");
        }
        self.handler.abort();
        tracing::info!("browser closed");
        Ok(())
    }
}
