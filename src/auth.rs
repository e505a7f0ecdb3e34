use std::io::Write as _;
use std::path::Path;

use url::Url;

use crate::browser::ShelfBrowser;
use crate::config::{AuthConfig, Credentials, ScrapeConfig};
use crate::error::ScrapeError;
use crate::formats::StoredCookie;
use crate::shelf::wait_for_page;
use crate::urls::is_sign_in_page;

const SIGN_IN_PATH: &str = "/user/sign_in";
const EMAIL_BUTTON_TEXT: &str = "Sign in with email";
const EMAIL_INPUT: &str = "input[type='email']";
const PASSWORD_INPUT: &str = "input[type='password']";
const SUBMIT_INPUT: &str = "input[type='submit']";

fn session_error(path: &Path, message: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Session {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

pub fn load_session(path: &Path) -> Result<Option<Vec<StoredCookie>>, ScrapeError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(session_error(path, format!("read: {err}"))),
    };
    let cookies = serde_json::from_slice::<Vec<StoredCookie>>(&bytes)
        .map_err(|err| session_error(path, format!("parse: {err}")))?;
    Ok(Some(cookies))
}

pub fn save_session(path: &Path, cookies: &[StoredCookie]) -> Result<(), ScrapeError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .map_err(|err| session_error(path, format!("create parent dir: {err}")))?;
    let json = serde_json::to_vec(cookies)
        .map_err(|err| session_error(path, format!("serialize: {err}")))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|err| session_error(path, format!("create temp file: {err}")))?;
    temp.write_all(&json)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| session_error(path, format!("write: {err}")))?;
    temp.persist(path)
        .map_err(|err| session_error(path, format!("replace: {}", err.error)))?;
    Ok(())
}

fn sign_in_url(target: &Url) -> Url {
    let mut url = target.clone();
    url.set_path(SIGN_IN_PATH);
    url.set_query(None);
    url.set_fragment(None);
    url
}

async fn login(
    browser: &dyn ShelfBrowser,
    target: &Url,
    credentials: &Credentials,
    config: &ScrapeConfig,
) -> Result<(), ScrapeError> {
    let url = sign_in_url(target);
    tracing::info!(url = %url, "signing in");
    browser.goto(&url).await?;
    wait_for_page(browser, config).await?;

    browser.click_text("button", EMAIL_BUTTON_TEXT).await?;
    browser.fill(EMAIL_INPUT, &credentials.login).await?;
    browser.fill(PASSWORD_INPUT, &credentials.password).await?;
    browser.click(SUBMIT_INPUT).await?;
    wait_for_page(browser, config).await
}

/// Makes sure `browser` can see `target` as a signed-in user.
pub async fn authenticate(
    browser: &dyn ShelfBrowser,
    target: &Url,
    auth: &AuthConfig,
    config: &ScrapeConfig,
) -> Result<(), ScrapeError> {
    if let Some(cookies) = load_session(&auth.session_file)? {
        tracing::debug!(cookies = cookies.len(), path = %auth.session_file.display(), "restoring session");
        // Cookies are scoped to the open origin, so land there first.
        browser.goto(target).await?;
        browser.set_cookies(&cookies).await?;
    }

    browser.goto(target).await?;
    wait_for_page(browser, config).await?;

    if is_sign_in_page(&browser.current_url().await?) {
        let credentials = auth
            .credentials
            .as_ref()
            .ok_or(ScrapeError::MissingCredentials)?;
        login(browser, target, credentials, config).await?;
        browser.goto(target).await?;
        wait_for_page(browser, config).await?;
    }

    let landed = browser.current_url().await?;
    if is_sign_in_page(&landed) {
        return Err(ScrapeError::LoginFailed(landed.to_string()));
    }

    let cookies = browser.cookies().await?;
    save_session(&auth.session_file, &cookies)?;
    tracing::info!(cookies = cookies.len(), path = %auth.session_file.display(), "session saved");
    Ok(())
}
