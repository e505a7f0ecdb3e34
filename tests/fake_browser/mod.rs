use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shelfscrape::browser::{ItemNode, ShelfBrowser};
use shelfscrape::error::DriverError;
use shelfscrape::formats::{RawBook, StoredCookie};
use url::Url;

pub const SESSION_COOKIE: &str = "session-id";
const SIGN_IN_URL: &str = "https://www.goodreads.com/user/sign_in";

/// How the scripted shelf grows.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum FakeShelf {
    /// `first` rows up front; each scroll renders `step` more, capped at `total`.
    Infinite { total: usize, first: usize, step: usize },
    /// Like `Infinite`, but the indicator reports `extra` books more than are
    /// rendered once the last scroll lands.
    Overshoot { total: usize, first: usize, step: usize, extra: usize },
    /// Indicator says more is coming but scrolling never renders new rows.
    Stalled { total: usize, first: usize },
    /// Rows per page plus the pagination anchor texts.
    Paginated { rows: Vec<usize>, links: Vec<String> },
    /// Rows only, with an empty load indicator present.
    Single { rows: usize },
    /// Rows only, with neither load indicator nor pagination in the DOM.
    Bare { rows: usize },
    /// Indicator text that is not a load count.
    GarbledIndicator { rows: usize },
    /// Like `Infinite`, but the indicator leaves the DOM after the first scroll.
    VanishingIndicator { total: usize, first: usize, step: usize },
    /// `document.readyState` never reaches complete.
    NeverReady,
}

#[derive(Debug, Default)]
struct State {
    current: Option<Url>,
    page: u32,
    rendered: usize,
    visited: Vec<String>,
    scrolls: usize,
    modal_clicks: Vec<(f64, f64)>,
    filled: Vec<(String, String)>,
    signed_in: bool,
    closed: bool,
}

/// Clones share one page state, so a test can keep a handle after moving the
/// browser into a session.
#[derive(Clone)]
pub struct FakeBrowser {
    shelf: FakeShelf,
    login_modal: bool,
    login: Option<(String, String)>,
    born: Option<String>,
    state: Arc<Mutex<State>>,
}

#[allow(dead_code)]
impl FakeBrowser {
    pub fn new(shelf: FakeShelf) -> Self {
        Self {
            shelf,
            login_modal: false,
            login: None,
            born: None,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_login_modal(mut self) -> Self {
        self.login_modal = true;
        self
    }

    /// Every page redirects to sign-in until these credentials are submitted
    /// or a valid session cookie is restored.
    pub fn requiring_login(mut self, login: &str, password: &str) -> Self {
        self.login = Some((login.to_owned(), password.to_owned()));
        self
    }

    pub fn with_born(mut self, born: &str) -> Self {
        self.born = Some(born.to_owned());
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake browser state poisoned")
    }

    pub fn visited(&self) -> Vec<String> {
        self.state().visited.clone()
    }

    pub fn scrolls(&self) -> usize {
        self.state().scrolls
    }

    pub fn modal_clicks(&self) -> Vec<(f64, f64)> {
        self.state().modal_clicks.clone()
    }

    pub fn filled(&self) -> Vec<(String, String)> {
        self.state().filled.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn total(&self) -> usize {
        match &self.shelf {
            FakeShelf::Infinite { total, .. }
            | FakeShelf::Overshoot { total, .. }
            | FakeShelf::Stalled { total, .. } => *total,
            FakeShelf::Paginated { rows, .. } => rows.iter().sum(),
            FakeShelf::Single { rows }
            | FakeShelf::Bare { rows }
            | FakeShelf::GarbledIndicator { rows } => *rows,
            FakeShelf::VanishingIndicator { total, .. } => *total,
            FakeShelf::NeverReady => 0,
        }
    }

    fn first_render(&self, page: u32) -> usize {
        match &self.shelf {
            FakeShelf::Infinite { first, .. }
            | FakeShelf::Overshoot { first, .. }
            | FakeShelf::Stalled { first, .. }
            | FakeShelf::VanishingIndicator { first, .. } => *first,
            FakeShelf::Paginated { rows, .. } => {
                rows.get(page as usize - 1).copied().unwrap_or_default()
            }
            FakeShelf::Single { rows }
            | FakeShelf::Bare { rows }
            | FakeShelf::GarbledIndicator { rows } => *rows,
            FakeShelf::NeverReady => 0,
        }
    }

    fn status_text(&self, rendered: usize) -> Option<String> {
        let total = self.total();
        match &self.shelf {
            FakeShelf::Infinite { .. } | FakeShelf::Stalled { .. } => {
                Some(format!("{} of {total} loaded", rendered.min(total)))
            }
            FakeShelf::Overshoot { extra, .. } if rendered >= total => {
                Some(format!("{} of {total} loaded", total + extra))
            }
            FakeShelf::Overshoot { .. } => Some(format!("{rendered} of {total} loaded")),
            FakeShelf::VanishingIndicator { first, .. } if rendered > *first => None,
            FakeShelf::VanishingIndicator { .. } => Some(format!("{rendered} of {total} loaded")),
            FakeShelf::GarbledIndicator { .. } => Some("loading your books…".to_owned()),
            FakeShelf::Single { .. } => Some(String::new()),
            FakeShelf::Paginated { .. } | FakeShelf::Bare { .. } | FakeShelf::NeverReady => None,
        }
    }

    fn raw_book(page: u32, index: usize) -> RawBook {
        RawBook {
            title: Some(format!("Book {page}-{index}")),
            isbn: Some(format!("{index:010}")),
            isbn13: Some(format!("978{index:010}")),
            author_name: Some("Machado de Assis".to_owned()),
            author_link: Some("https://www.goodreads.com/author/show/4711.Machado_de_Assis".to_owned()),
            avg_rating: Some("4.10".to_owned()),
            user_rating: Some("really liked it".to_owned()),
            num_pages: Some("320 pp".to_owned()),
            publishing_date: Some("1899".to_owned()),
            started_date: Some(String::new()),
            finished_date: Some("Jan 02, 2020".to_owned()),
            added_date: Some("Jan 01, 2020".to_owned()),
        }
    }

    fn rows(&self) -> Vec<RawBook> {
        let state = self.state();
        (0..state.rendered)
            .map(|index| Self::raw_book(state.page, index))
            .collect()
    }
}

struct FakeItem(RawBook);

#[async_trait]
impl ItemNode for FakeItem {
    async fn visible_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        Ok(if selector.contains("title") {
            self.0.title.clone()
        } else if selector.contains("author") {
            self.0.author_name.clone()
        } else if selector.contains("rating") {
            self.0.user_rating.clone()
        } else {
            None
        })
    }

    async fn hidden_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let field = if selector.contains("isbn13") {
            &self.0.isbn13
        } else if selector.contains("isbn") {
            &self.0.isbn
        } else if selector.contains("avg_rating") {
            &self.0.avg_rating
        } else if selector.contains("num_pages") {
            &self.0.num_pages
        } else if selector.contains("date_pub") {
            &self.0.publishing_date
        } else if selector.contains("date_started") {
            &self.0.started_date
        } else if selector.contains("date_read") {
            &self.0.finished_date
        } else if selector.contains("date_added") {
            &self.0.added_date
        } else {
            return Ok(None);
        };
        Ok(field.clone())
    }

    async fn link_href(&self, _selector: &str) -> Result<Option<String>, DriverError> {
        Ok(self.0.author_link.clone())
    }
}

#[async_trait]
impl ShelfBrowser for FakeBrowser {
    fn engine(&self) -> &'static str {
        "fake"
    }

    async fn goto(&self, url: &Url) -> Result<(), DriverError> {
        let page = url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(1);
        let rendered = self.first_render(page);

        let mut state = self.state();
        state.visited.push(url.to_string());
        let redirect = self.login.is_some() && !state.signed_in && !url.path().contains("sign_in");
        state.current = Some(if redirect {
            Url::parse(SIGN_IN_URL).map_err(|err| DriverError::Command(err.to_string()))?
        } else {
            url.clone()
        });
        state.page = page;
        state.rendered = if redirect { 0 } else { rendered };
        Ok(())
    }

    async fn current_url(&self) -> Result<Url, DriverError> {
        self.state()
            .current
            .clone()
            .ok_or_else(|| DriverError::Command("no page loaded".to_owned()))
    }

    async fn is_ready(&self) -> Result<bool, DriverError> {
        if matches!(self.shelf, FakeShelf::NeverReady) {
            return Ok(false);
        }
        Ok(self.state().current.is_some())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        Ok(match selector {
            "body" => 1,
            ".bookalike" => self.state().rendered,
            ".loginModal" => usize::from(self.login_modal && self.state().modal_clicks.is_empty()),
            "#reviewPagination" => usize::from(matches!(self.shelf, FakeShelf::Paginated { .. })),
            _ => 0,
        })
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        if selector != "#infiniteStatus" {
            return Ok(None);
        }
        let rendered = self.state().rendered;
        Ok(self.status_text(rendered))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        match (&self.shelf, selector) {
            (FakeShelf::Paginated { links, .. }, "#reviewPagination a") => Ok(links.clone()),
            _ => Ok(Vec::new()),
        }
    }

    async fn labeled_value(
        &self,
        _label_selector: &str,
        label: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(if label == "Born" { self.born.clone() } else { None })
    }

    async fn items(&self, _selector: &str) -> Result<Vec<Box<dyn ItemNode>>, DriverError> {
        Ok(self
            .rows()
            .into_iter()
            .map(|raw| Box::new(FakeItem(raw)) as Box<dyn ItemNode>)
            .collect())
    }

    async fn scroll_to_end(&self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.scrolls += 1;
        match &self.shelf {
            FakeShelf::Infinite { total, step, .. }
            | FakeShelf::Overshoot { total, step, .. }
            | FakeShelf::VanishingIndicator { total, step, .. } => {
                state.rendered = (state.rendered + step).min(*total);
            }
            _ => {}
        }
        Ok(())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError> {
        self.state().modal_clicks.push((x, y));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        if selector != "input[type='submit']" {
            return Err(DriverError::NotFound(selector.to_owned()));
        }
        let mut state = self.state();
        if let Some((login, password)) = &self.login {
            let filled = |field: &str| {
                state
                    .filled
                    .iter()
                    .rev()
                    .find(|(selector, _)| selector.contains(field))
                    .map(|(_, value)| value.clone())
            };
            let ok = filled("email").as_deref() == Some(login.as_str())
                && filled("password").as_deref() == Some(password.as_str());
            state.signed_in = ok;
        }
        Ok(())
    }

    async fn click_text(&self, tag: &str, text: &str) -> Result<(), DriverError> {
        if tag == "button" && text == "Sign in with email" {
            return Ok(());
        }
        Err(DriverError::NotFound(format!("{tag} containing {text:?}")))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.state()
            .filled
            .push((selector.to_owned(), value.to_owned()));
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Ok(serde_json::to_value(self.rows())?)
    }

    async fn cookies(&self) -> Result<Vec<StoredCookie>, DriverError> {
        let signed_in = self.state().signed_in;
        Ok(signed_in
            .then(|| StoredCookie {
                name: SESSION_COOKIE.to_owned(),
                value: "valid".to_owned(),
                domain: Some(".goodreads.com".to_owned()),
                path: Some("/".to_owned()),
                secure: true,
                http_only: true,
                expiry: None,
            })
            .into_iter()
            .collect())
    }

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), DriverError> {
        if cookies
            .iter()
            .any(|cookie| cookie.name == SESSION_COOKIE && cookie.value == "valid")
        {
            self.state().signed_in = true;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.state().closed = true;
        Ok(())
    }
}
