use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// Request line and `Cookie` header of one served request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub url: String,
    pub cookie: Option<String>,
}

/// Serves fixed HTML bodies keyed by request path and query.
pub struct SiteStub {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl SiteStub {
    pub fn spawn(pages: HashMap<String, String>) -> Self {
        Self::spawn_setting_cookie(pages, None)
    }

    /// Like [`SiteStub::spawn`], but every page response carries `set_cookie`
    /// as a `Set-Cookie` header.
    pub fn spawn_setting_cookie(pages: HashMap<String, String>, set_cookie: Option<&str>) -> Self {
        let set_cookie = set_cookie.map(|value| {
            tiny_http::Header::from_bytes(&b"Set-Cookie"[..], value.as_bytes())
                .expect("set-cookie header")
        });
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_server = Arc::clone(&seen);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let cookie = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Cookie"))
                    .map(|header| header.value.as_str().to_owned());
                seen_by_server
                    .lock()
                    .expect("seen requests poisoned")
                    .push(SeenRequest {
                        url: url.clone(),
                        cookie,
                    });

                let response = match pages.get(&url) {
                    Some(body) => {
                        let mut response = tiny_http::Response::from_string(body.clone())
                            .with_header(
                                tiny_http::Header::from_bytes(
                                    &b"Content-Type"[..],
                                    &b"text/html; charset=utf-8"[..],
                                )
                                .expect("content-type header"),
                            )
                            .with_status_code(200);
                        if let Some(header) = &set_cookie {
                            response.add_header(header.clone());
                        }
                        response
                    }
                    None => tiny_http::Response::from_string("not found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            seen,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("seen requests poisoned").clone()
    }
}

impl Drop for SiteStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Minimal shelf page: one `.bookalike` row per title, plus the pagination
/// control when `links` is non-empty.
#[allow(dead_code)]
pub fn shelf_page(titles: &[&str], links: &[&str]) -> String {
    let rows = titles
        .iter()
        .enumerate()
        .map(|(index, title)| {
            format!(
                r#"<tr class="bookalike review">
  <td class="field title"><label>title</label><div class="value"><a href="/book/show/{index}">{title}</a></div></td>
  <td class="field author"><label>author</label><div class="value"><a href="/author/show/{index}.Someone">Someone</a></div></td>
  <td class="field isbn" style="display: none"><label>isbn</label><div class="value">000000000{index}</div></td>
  <td class="field isbn13" style="display: none"><label>isbn13</label><div class="value">978000000000{index}</div></td>
  <td class="field num_pages" style="display: none"><label>num pages</label><div class="value"><nobr>{pages} <span>pp</span></nobr></div></td>
  <td class="field avg_rating"><label>avg rating</label><div class="value">3.50</div></td>
  <td class="field rating"><label>my rating</label><div class="value"><span class="staticStars">it was ok</span></div></td>
  <td class="field date_pub" style="display: none"><label>date pub</label><div class="value">2001</div></td>
  <td class="field date_started" style="display: none"><label>date started</label><div class="value"></div></td>
  <td class="field date_read"><label>date read</label><div class="value">Feb 02, 2022</div></td>
  <td class="field date_added"><label>date added</label><div class="value">Feb 01, 2022</div></td>
</tr>"#,
                pages = 100 + index
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let pagination = if links.is_empty() {
        String::new()
    } else {
        let anchors = links
            .iter()
            .map(|text| format!(r##"<a href="#">{text}</a>"##))
            .collect::<Vec<_>>()
            .join(" ");
        format!(r#"<div id="reviewPagination"><em class="current">1</em> {anchors}</div>"#)
    };

    format!(
        r#"<!DOCTYPE html>
<html><body>
<table id="books"><tbody id="booksBody">
{rows}
</tbody></table>
{pagination}
</body></html>"#
    )
}

#[allow(dead_code)]
pub fn author_page(born: Option<&str>) -> String {
    let born = born
        .map(|place| {
            format!(
                r#"<div class="dataTitle">Born</div>
<div class="dataItem" itemprop="birthPlace">{place}</div>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html><body>
<div class="rightContainer">
<div class="dataTitle">Website</div>
<div class="dataItem"><a href="https://example.com">https://example.com</a></div>
{born}
<div class="dataTitle">Genre</div>
<div class="dataItem">Fiction</div>
</div>
</body></html>"#
    )
}
