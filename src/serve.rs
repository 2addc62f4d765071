//! HTTP server for writing and looking up posts
//!
//! `notary serve` → starts server, opens browser, serves the compose page and
//! the JSON API behind it.

use crate::notary::{Notary, NotaryError, Submission};
use crate::post::{Post, PostView};
use crate::store::PostStore;
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server};

// Embed the UI directly in the binary
const STYLE_CSS: &str = include_str!("ui/style.css");
const HOME_HTML: &str = include_str!("ui/home.html");
const WRITE_HTML: &str = include_str!("ui/write.html");
const POST_HTML: &str = include_str!("ui/post.html");

/// Largest request body accepted; a long post plus its key events fits easily
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Threads pulling requests off the listener
    pub workers: usize,
    pub open_browser: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3333,
            workers: 4,
            open_browser: true,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct SearchHit {
    exists: bool,
    id: String,
}

#[derive(Deserialize, Debug, Default)]
struct SearchParams {
    #[serde(default)]
    id: String,
}

/// A response before it is handed to tiny_http
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn html(status: u16, body: String) -> Self {
        Self { status, content_type: HTML, body }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, content_type: JSON, body },
            Err(e) => {
                log::error!("failed to serialize response: {}", e);
                Self {
                    status: 500,
                    content_type: JSON,
                    body: r#"{"error":"Internal server error"}"#.to_string(),
                }
            }
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, &ErrorBody { error: message.to_string() })
    }

    fn from_error(e: &NotaryError) -> Self {
        Self::error(e.status_code(), &e.to_string())
    }
}

/// Start server, open browser, serve UI
pub fn start<S: PostStore + 'static>(config: &ServeConfig, notary: Notary<S>) -> io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let server = Server::http(&addr).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let server = Arc::new(server);
    let notary = Arc::new(notary);

    let url = format!("http://localhost:{}", config.port);
    log::info!("Human Notary listening on {} ({} workers)", url, config.workers);

    if config.open_browser {
        let _ = open::that(&url);
    }

    let handles = spawn_workers(server, notary, config.workers);

    for handle in handles {
        if handle.join().is_err() {
            log::error!("server worker panicked");
        }
    }

    Ok(())
}

/// Worker threads that answer requests until the server shuts down
fn spawn_workers<S: PostStore + 'static>(
    server: Arc<Server>,
    notary: Arc<Notary<S>>,
    count: usize,
) -> Vec<JoinHandle<()>> {
    (0..count.max(1))
        .map(|_| {
            let server = Arc::clone(&server);
            let notary = Arc::clone(&notary);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    if let Err(e) = handle_request(request, &notary) {
                        log::warn!("failed to answer request: {}", e);
                    }
                }
            })
        })
        .collect()
}

/// Read at most `limit` bytes; `None` when the body is longer
fn read_body<R: Read>(reader: R, limit: u64) -> io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        Ok(None)
    } else {
        Ok(Some(body))
    }
}

fn handle_request<S: PostStore>(mut request: Request, notary: &Notary<S>) -> io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = if method == Method::Post {
        match read_body(request.as_reader(), MAX_BODY_BYTES)? {
            None => Reply::error(413, "Request body too large"),
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(body) => route(&method, &url, &body, notary),
                Err(_) => Reply::error(400, "Invalid request body"),
            },
        }
    } else {
        route(&method, &url, "", notary)
    };
    log::debug!("{} {} -> {}", method, url, reply.status);

    let header = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid content type"))?;
    let response = Response::from_string(reply.body)
        .with_status_code(reply.status)
        .with_header(header);
    request.respond(response)
}

/// Dispatch one request. Pure apart from the store behind `notary`.
pub fn route<S: PostStore>(method: &Method, url: &str, body: &str, notary: &Notary<S>) -> Reply {
    let mut parts = url.splitn(2, '?');
    let path = parts.next().unwrap_or("/");
    let query = parts.next().unwrap_or("");

    match (method, path) {
        // Pages
        (&Method::Get, "/") => Reply::html(200, page(HOME_HTML)),
        (&Method::Get, "/write") => Reply::html(200, page(WRITE_HTML)),
        (&Method::Get, p) if p.starts_with("/posts/") => {
            let id = &p["/posts/".len()..];
            match notary.lookup(id) {
                Ok(post) => Reply::html(200, render_post_page(&post)),
                Err(NotaryError::NotFound) | Err(NotaryError::IdRequired) => {
                    Reply::html(404, render_not_found_page())
                }
                Err(e) => Reply::html(e.status_code(), render_error_page(&e)),
            }
        }

        // API: submit a post
        (&Method::Post, "/api/posts") => {
            let submission: Submission = match serde_json::from_str(body) {
                Ok(s) => s,
                Err(e) => {
                    log::debug!("rejected submission body: {}", e);
                    return Reply::error(400, "Invalid request body");
                }
            };
            match notary.submit(&submission) {
                Ok(receipt) => Reply::json(200, &receipt),
                Err(e) => Reply::from_error(&e),
            }
        }

        // API: does this id exist
        (&Method::Get, "/api/posts/search") => {
            let params: SearchParams = serde_urlencoded::from_str(query).unwrap_or_default();
            match notary.search(&params.id) {
                Ok(id) => Reply::json(200, &SearchHit { exists: true, id }),
                Err(e) => Reply::from_error(&e),
            }
        }

        // API: fetch a post
        (&Method::Get, p) if p.starts_with("/api/posts/") => {
            let id = &p["/api/posts/".len()..];
            match notary.lookup(id) {
                Ok(post) => Reply::json(200, &PostView::from(&post)),
                Err(e) => Reply::from_error(&e),
            }
        }

        // API: store statistics
        (&Method::Get, "/api/stats") => match notary.stats() {
            Ok(stats) => Reply::json(200, &stats),
            Err(e) => Reply::from_error(&e),
        },

        _ => Reply::error(404, "Not found"),
    }
}

fn page(template: &str) -> String {
    template.replace("{{STYLE}}", STYLE_CSS)
}

fn post_page(title: &str, main: &str) -> String {
    page(POST_HTML)
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{MAIN}}", main)
}

/// Full page for a stored post
pub fn render_post_page(post: &Post) -> String {
    let (badge_class, badge_text) = if post.verified {
        ("verified", "Verified Human")
    } else {
        ("unverified", "Unverified")
    };
    let footnote = if post.verified {
        "This post was verified as typed by a human."
    } else {
        "This post could not be verified as typed by a human."
    };

    let main = format!(
        r#"<div class="wide">
  <div class="meta">
    <div>
      <code>ID: {id}</code>
      <p class="muted">{date}</p>
    </div>
    <span class="badge {badge_class}">{badge_text} ({score}%)</span>
  </div>
  <div class="card"><p class="content">{content}</p></div>
  <p class="muted">{footnote}</p>
  <a class="button outline" href="/write">Write your own</a>
</div>"#,
        id = escape_html(&post.id),
        date = escape_html(&format_date(&post.created_at)),
        badge_class = badge_class,
        badge_text = badge_text,
        score = post.score_percent(),
        content = escape_html(&post.content),
        footnote = footnote,
    );

    post_page(&format!("{} - Human Notary", post.id), &main)
}

fn render_not_found_page() -> String {
    let main = r#"<div class="narrow">
  <h1>Post Not Found</h1>
  <p class="muted">The post you're looking for doesn't exist or has been removed.</p>
  <a class="button" href="/">Go Home</a>
</div>"#;
    post_page("Not Found - Human Notary", main)
}

fn render_error_page(e: &NotaryError) -> String {
    let main = format!(
        r#"<div class="narrow">
  <h1>Something went wrong</h1>
  <p class="muted">{}</p>
  <a class="button" href="/">Go Home</a>
</div>"#,
        escape_html(&e.to_string())
    );
    post_page("Error - Human Notary", &main)
}

/// "March 5, 2024 at 14:02 UTC", or the raw value if it is not RFC 3339
fn format_date(created_at: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(created_at) {
        Ok(dt) => dt
            .with_timezone(&chrono::Utc)
            .format("%B %-d, %Y at %H:%M UTC")
            .to_string(),
        Err(_) => created_at.to_string(),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
