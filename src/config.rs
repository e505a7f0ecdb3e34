use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

pub const DEFAULT_SHELF: &str = "read";
pub const DEFAULT_SESSION_FILE: &str = "login.json";
pub const LOGIN_ENV: &str = "GR_LOGIN";
pub const PASSWORD_ENV: &str = "GR_PASSWORD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExtractStrategy {
    /// One DOM query per field per row.
    #[default]
    PerItem,
    /// One in-page script call for the whole page.
    Batch,
}

#[derive(Debug, Clone)]
pub struct Timeouts {
    pub page_ready: Duration,
    pub body: Duration,
    pub status_probe: Duration,
    pub scroll_progress: Duration,
    pub status_refresh: Duration,
    pub pagination_probe: Duration,
    pub author_probe: Duration,
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_ready: Duration::from_secs(30),
            body: Duration::from_secs(10),
            status_probe: Duration::from_secs(5),
            scroll_progress: Duration::from_secs(10),
            status_refresh: Duration::from_secs(5),
            pagination_probe: Duration::from_secs(10),
            author_probe: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub timeouts: Timeouts,
    pub strategy: ExtractStrategy,
    /// Shelf name written into derived shelf and pagination URLs.
    pub shelf: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            strategy: ExtractStrategy::default(),
            shelf: DEFAULT_SHELF.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub credentials: Option<Credentials>,
    pub session_file: PathBuf,
}

impl AuthConfig {
    pub fn new(session_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials: None,
            session_file: session_file.into(),
        }
    }

    pub fn with_credentials(mut self, login: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            login: login.to_owned(),
            password: password.to_owned(),
        });
        self
    }

    /// Reads `GR_LOGIN` / `GR_PASSWORD`. Both or neither must be set.
    pub fn from_env(session_file: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Self::from_lookup(session_file, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        session_file: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let config = Self::new(session_file);
        let login = lookup(LOGIN_ENV).filter(|v| !v.trim().is_empty());
        let password = lookup(PASSWORD_ENV).filter(|v| !v.is_empty());
        match (login, password) {
            (Some(login), Some(password)) => Ok(config.with_credentials(login.trim(), &password)),
            (None, None) => Ok(config),
            (Some(_), None) => {
                Err(anyhow::anyhow!("{PASSWORD_ENV} is not set")).context("read credentials")
            }
            (None, Some(_)) => {
                Err(anyhow::anyhow!("{LOGIN_ENV} is not set")).context("read credentials")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: String,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"
                .to_owned(),
        }
    }
}
