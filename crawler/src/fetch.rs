use crate::url_norm::resolve_link;
use crate::CrawlOptions;
use lazy_static::lazy_static;
use reqwest::{header, redirect, Client};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

lazy_static! {
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_H1: Selector = Selector::parse("h1").expect("valid selector");
    static ref SEL_P: Selector = Selector::parse("p").expect("valid selector");
    static ref SEL_BODY: Selector = Selector::parse("body").expect("valid selector");
    static ref SEL_A: Selector = Selector::parse("a[href]").expect("valid selector");
}

/// Why a URL ended in the Failed state.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("not HTML ({0})")]
    NotHtml(String),
    #[error("body larger than {0} bytes")]
    TooLarge(usize),
    #[error("no title or text could be extracted")]
    Empty,
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { FetchFailure::Timeout } else { FetchFailure::Network(e.to_string()) }
    }
}

pub struct FetchedPage {
    pub final_url: Url,
    pub body: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    pub title: String,
    pub text: String,
    /// Normalized http(s) links in document order, without duplicates.
    pub links: Vec<Url>,
}

pub fn build_client(opts: &CrawlOptions) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(opts.user_agent.clone())
        .redirect(redirect::Policy::limited(5))
        .timeout(opts.request_timeout)
        .connect_timeout(opts.request_timeout.min(Duration::from_secs(5)))
        .build()
}

pub async fn fetch_html(client: &Client, url: &Url, max_bytes: usize) -> Result<FetchedPage, FetchFailure> {
    let resp = client.get(url.clone()).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchFailure::Status(status.as_u16()));
    }
    if let Some(ct) = resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        let ct = ct.to_ascii_lowercase();
        if !(ct.starts_with("text/html") || ct.starts_with("application/xhtml")) {
            return Err(FetchFailure::NotHtml(ct));
        }
    }
    if resp.content_length().is_some_and(|n| n > max_bytes as u64) {
        return Err(FetchFailure::TooLarge(max_bytes));
    }
    let final_url = resp.url().clone();
    let bytes = resp.bytes().await?;
    if bytes.len() > max_bytes {
        return Err(FetchFailure::TooLarge(max_bytes));
    }
    Ok(FetchedPage { final_url, body: String::from_utf8_lossy(&bytes).into_owned() })
}

/// Best-effort extraction from possibly malformed HTML. Paragraph text is
/// preferred; pages without `<p>` fall back to all visible body text.
pub fn parse_page(body: &str, base: &Url) -> ParsedPage {
    let doc = Html::parse_document(body);

    let title = doc
        .select(&SEL_TITLE)
        .chain(doc.select(&SEL_H1))
        .map(|n| collapse_whitespace(&n.text().collect::<String>()))
        .find(|t| !t.is_empty())
        .unwrap_or_default();

    let paragraphs: Vec<String> = doc
        .select(&SEL_P)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    let text = if paragraphs.is_empty() {
        doc.select(&SEL_BODY).next().map(|b| visible_text(&b)).unwrap_or_default()
    } else {
        paragraphs.join("\n")
    };

    let mut seen = HashSet::new();
    let links = doc
        .select(&SEL_A)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .filter(|u| seen.insert(u.as_str().to_string()))
        .collect();

    ParsedPage { title, text, links }
}

fn visible_text(body: &scraper::ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style" | "noscript" | "template")))
            .unwrap_or(false);
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String { s.split_whitespace().collect::<Vec<_>>().join(" ") }

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url { Url::parse("https://marvel.fandom.com/wiki/Thor").unwrap() }

    #[test]
    fn extracts_title_paragraphs_and_links() {
        let html = r#"<html><head><title> Thor  (Earth-616) </title></head><body>
            <p>Thor is the  God of Thunder.</p><p></p><p>Son of <a href="/wiki/Odin">Odin</a>.</p>
            <a href="/wiki/Odin#Bio">again</a><a href="mailto:x@y.z">mail</a><a href="https://other.test/x?y=1">ext</a>
            </body></html>"#;
        let page = parse_page(html, &base());
        assert_eq!(page.title, "Thor (Earth-616)");
        assert_eq!(page.text, "Thor is the God of Thunder.\nSon of Odin.");
        let links: Vec<&str> = page.links.iter().map(Url::as_str).collect();
        assert_eq!(links, vec!["https://marvel.fandom.com/wiki/Odin", "https://other.test/x"]);
    }

    #[test]
    fn falls_back_to_body_text_without_script() {
        let html = "<body><h1>Loki</h1><div>Trickster <b>god</b></div><script>var x = 1;</script></body>";
        let page = parse_page(html, &base());
        assert_eq!(page.title, "Loki");
        assert_eq!(page.text, "Loki Trickster god");
    }

    #[test]
    fn malformed_markup_is_best_effort() {
        let page = parse_page("<p>Broken <a href='/wiki/Hela'>Hela<p>unclosed <div", &base());
        assert!(page.text.contains("Broken"));
        assert_eq!(page.links.len(), 1);
        assert!(parse_page("", &base()).text.is_empty());
    }
}
