//! Web page fetching for the WebSurfer agent

use async_trait::async_trait;
use futures::StreamExt;
use scraper::{Html, Selector};
use sdk::errors::EngineError;
use std::time::Duration;
use tracing::{debug, info};

use super::{str_arg, truncate, Tool};

const USER_AGENT: &str = concat!("dreamteam/", env!("CARGO_PKG_VERSION"));

/// Line width handed to the HTML renderer
const TEXT_WIDTH: usize = 100;

const HTML_SLACK_FACTOR: usize = 8;
const MIN_HTML_BYTES: usize = 256 * 1024;
const MIN_TEXT_SLACK: usize = 64 * 1024;

pub struct FetchUrlTool {
    client: reqwest::Client,
    max_bytes: usize,
}

impl FetchUrlTool {
    pub fn new(max_bytes: usize) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &'static str {
        "fetch_url"
    }

    fn description(&self) -> &'static str {
        "Download a web page over HTTP(S) and return its readable text."
    }

    fn arguments_hint(&self) -> &'static str {
        r#"{"url": "https://example.com/page"}"#
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let url = str_arg(args, "url")?.trim();
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| EngineError::ToolError(format!("invalid url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EngineError::ToolError(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        info!("Fetching {}", parsed);
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::ToolError(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(false);

        let limit = raw_limit(self.max_bytes, is_html);
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| EngineError::Network(e.to_string()))?;
            body.extend_from_slice(&chunk);
            if body.len() >= limit {
                debug!("Stopped reading {} after {} bytes", url, body.len());
                body.truncate(limit);
                break;
            }
        }

        let body = String::from_utf8_lossy(&body);
        let text = if is_html {
            html_to_text(&body)
        } else {
            body.into_owned()
        };
        Ok(truncate(&text, self.max_bytes))
    }
}

/// Bytes read off the wire before the rest of the body is dropped.
/// Markup needs room beyond the text cap.
fn raw_limit(max_bytes: usize, is_html: bool) -> usize {
    if is_html {
        max_bytes
            .saturating_mul(HTML_SLACK_FACTOR)
            .max(MIN_HTML_BYTES)
    } else {
        max_bytes.saturating_add(MIN_TEXT_SLACK)
    }
}

/// Reduce an HTML document to readable text, led by its title when it has one
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let title = Selector::parse("title")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let text = html2text::from_read(html.as_bytes(), TEXT_WIDTH).unwrap_or_default();
    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();

    match title {
        Some(title) if !text.starts_with(&title) => format!("Title: {}\n\n{}", title, text),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_html_to_text() {
        let html = r#"<html><head><title>x</title><style>p{color:red}</style></head>
            <body><h1>Towers</h1><p>Burj Khalifa &amp; friends</p>
            <script>alert(1)</script><ul><li>828 m</li></ul></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Towers"));
        assert!(text.contains("Burj Khalifa & friends"));
        assert!(text.contains("828 m"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
        assert!(text.starts_with("Title: x"));
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>Hello <b>web</b></p>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let tool = FetchUrlTool::new(1000).unwrap();
        let out = tool
            .call(&json!({"url": format!("{}/page", server.uri())}))
            .await
            .unwrap();
        assert!(out.contains("Hello"));
        assert!(out.contains("web"));
        assert!(!out.contains("<b>"));
    }

    #[tokio::test]
    async fn test_fetch_truncates_and_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tool = FetchUrlTool::new(10).unwrap();
        let out = tool
            .call(&json!({"url": format!("{}/big", server.uri())}))
            .await
            .unwrap();
        assert!(out.starts_with("xxxxxxxxxx\n[truncated 90 bytes]"));

        let err = tool
            .call(&json!({"url": format!("{}/missing", server.uri())}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let tool = FetchUrlTool::new(10).unwrap();
        assert!(tool.call(&json!({"url": "file:///etc/passwd"})).await.is_err());
        assert!(tool.call(&json!({"url": "not a url"})).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_body_is_not_read_in_full() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("y".repeat(4 * 1024 * 1024)),
            )
            .mount(&server)
            .await;

        let tool = FetchUrlTool::new(1000).unwrap();
        let out = tool
            .call(&json!({"url": format!("{}/huge", server.uri())}))
            .await
            .unwrap();

        let (kept, note) = out.split_once('\n').unwrap();
        assert_eq!(kept.len(), 1000);
        let dropped: usize = note
            .trim_start_matches("[truncated ")
            .trim_end_matches(" bytes]")
            .parse()
            .unwrap();
        assert!(dropped <= raw_limit(1000, false) - 1000);
    }

    #[test]
    fn test_raw_limit_leaves_room_for_markup() {
        assert_eq!(raw_limit(1000, true), 256 * 1024);
        assert_eq!(raw_limit(100_000, true), 800_000);
        assert_eq!(raw_limit(1000, false), 1000 + 64 * 1024);
        assert_eq!(raw_limit(usize::MAX, true), usize::MAX);
    }
}
