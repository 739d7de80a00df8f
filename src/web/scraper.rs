//! Page fetching and HTML-to-text cleanup.

use crate::error::{GraphragError, Result};
use html2text::render::text_renderer::TrivialDecorator;
use reqwest::Client;
use std::time::Duration;

/// Wide enough that html2text never wraps inside a word
const WRAP_WIDTH: usize = 10_000;

/// Fetches pages and reduces them to whitespace-normalized visible text.
#[derive(Debug, Clone)]
pub struct WebScraper {
    http: Client,
}

impl WebScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("graphrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GraphragError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }

    /// Text content of `url`, or an empty string if the page could not be
    /// fetched. Failures are logged, never returned.
    pub async fn scrape(&self, url: &str) -> String {
        match self.fetch(url).await {
            Ok(html) => html_to_text(&html),
            Err(e) => {
                log::warn!("Error scraping {}: {}", url, e);
                String::new()
            }
        }
    }

    /// Raw response body. Error statuses still yield their body.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url)
            .map_err(|e| GraphragError::InvalidInput(format!("Invalid URL {}: {}", url, e)))?;

        let response = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(|e| GraphragError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("{} answered {}, using its body anyway", url, status);
        }

        response
            .text()
            .await
            .map_err(|e| GraphragError::Http(format!("Failed to read body: {}", e)))
    }
}

/// Visible text of an HTML document with every whitespace run collapsed to a
/// single space. `<head>`, `<script>`, `<style>` and comments are dropped and
/// entities are decoded.
pub fn html_to_text(html: &str) -> String {
    let text = html2text::from_read_with_decorator(html.as_bytes(), WRAP_WIDTH, TrivialDecorator::new());

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_html_to_text_strips_script_and_style() {
        let html = r#"<!DOCTYPE html>
<html><head><title>Welcome</title>
<style type="text/css">body { color: red; }</style>
<SCRIPT>var x = "<b>hidden</b>";</SCRIPT>
</head>
<body><h1>Python</h1><!-- nav --><p>is a   <em>programming</em>
language.</p><script>track("body")</script><style>p { margin: 0 }</style></body></html>"#;

        assert_eq!(html_to_text(html), "Python is a programming language.");
    }

    #[test]
    fn test_html_to_text_decodes_entities() {
        let html = "<p>Fish&nbsp;&amp;&nbsp;chips &lt;3 &#169; &#x2014;</p>";
        assert_eq!(html_to_text(html), "Fish & chips <3 \u{a9} \u{2014}");
    }

    #[test]
    fn test_html_to_text_decodes_named_entities() {
        let html = "<p>caf&eacute; &rsquo;s &euro;5 &ldquo;x&rdquo;</p>";
        assert_eq!(html_to_text(html), "caf\u{e9} \u{2019}s \u{20ac}5 \u{201c}x\u{201d}");
    }

    #[test]
    fn test_html_to_text_keeps_bare_angle_brackets() {
        assert_eq!(
            html_to_text("<p>if a < b and c > d then</p>"),
            "if a < b and c > d then"
        );
    }

    #[test]
    fn test_html_to_text_links_without_footnotes() {
        let html = r#"<ul><li><a href="/docs">Docs</a></li><li>Downloads</li></ul>"#;
        assert_eq!(html_to_text(html), "Docs Downloads");
    }

    #[test]
    fn test_html_to_text_escaped_markup_stays_text() {
        assert_eq!(html_to_text("<code>&lt;script&gt;</code>"), "<script>");
    }

    #[test]
    fn test_html_to_text_empty() {
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("<div>  </div>"), "");
    }

    #[tokio::test]
    async fn test_scrape_page() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/about");
            then.status(200)
                .header("Content-Type", "text/html")
                .body("<html><body><p>About   us</p><script>track()</script></body></html>");
        });

        let scraper = WebScraper::new(Duration::from_secs(5)).unwrap();
        let text = scraper.scrape(&server.url("/about")).await;

        assert_eq!(text, "About us");
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_scrape_error_status_still_parsed() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("<h1>Not Found</h1>");
        });

        let scraper = WebScraper::new(Duration::from_secs(5)).unwrap();
        assert_eq!(scraper.scrape(&server.url("/missing")).await, "Not Found");
    }

    #[tokio::test]
    async fn test_scrape_unreachable_is_empty() {
        let scraper = WebScraper::new(Duration::from_secs(2)).unwrap();
        assert_eq!(scraper.scrape("http://127.0.0.1:1/").await, "");
    }

    #[tokio::test]
    async fn test_scrape_invalid_url_is_empty() {
        let scraper = WebScraper::new(Duration::from_secs(2)).unwrap();
        assert_eq!(scraper.scrape("not a url").await, "");

        let err = scraper.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, GraphragError::InvalidInput(_)));
    }
}
