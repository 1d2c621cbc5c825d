use crate::CrawlError;
use url::Url;

/// Canonical form used for deduplication and document ids: http(s) only,
/// host required (and lowercased by the parser), no fragment, no query, no
/// trailing slash except on the root path.
pub fn normalize_url(raw: &str) -> Result<Url, CrawlError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| CrawlError::InvalidUrl { url: raw.to_string(), reason: e.to_string() })?;
    canonicalize(&mut url).map_err(|reason| CrawlError::InvalidUrl { url: raw.to_string(), reason })?;
    Ok(url)
}

/// Resolve an `href` against the page it was found on and normalize it.
/// Returns `None` for anything that is not a crawlable http(s) URL.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') { return None; }
    let mut url = Url::parse(href).or_else(|_| base.join(href)).ok()?;
    canonicalize(&mut url).ok()?;
    Some(url)
}

fn canonicalize(url: &mut Url) -> Result<(), String> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme {}", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".into());
    }
    url.set_fragment(None);
    url.set_query(None);
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed.as_str() });
    }
    Ok(())
}

/// Lowercase host of an already normalized URL, with the port when present,
/// e.g. `marvel.fandom.com` or `127.0.0.1:8080`.
pub fn host_key(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(h), Some(p)) => format!("{h}:{p}"),
        (Some(h), None) => h.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment_query_and_trailing_slash() {
        let u = normalize_url("https://Marvel.Fandom.com/wiki/Thor/?so=1#Powers").unwrap();
        assert_eq!(u.as_str(), "https://marvel.fandom.com/wiki/Thor");
        let root = normalize_url("https://marvel.fandom.com").unwrap();
        assert_eq!(root.as_str(), "https://marvel.fandom.com/");
    }

    #[test]
    fn rejects_non_http() {
        assert!(normalize_url("mailto:stan@marvel.com").is_err());
        assert!(normalize_url("ftp://marvel.fandom.com/x").is_err());
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn resolves_relative_links() {
        let base = normalize_url("https://marvel.fandom.com/wiki/Thor").unwrap();
        assert_eq!(resolve_link(&base, "/wiki/Loki#Bio").unwrap().as_str(), "https://marvel.fandom.com/wiki/Loki");
        assert_eq!(resolve_link(&base, "Odin").unwrap().as_str(), "https://marvel.fandom.com/wiki/Odin");
        assert!(resolve_link(&base, "#top").is_none());
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
    }

    #[test]
    fn host_key_keeps_port() {
        assert_eq!(host_key(&normalize_url("http://127.0.0.1:4000/a").unwrap()), "127.0.0.1:4000");
        assert_eq!(host_key(&normalize_url("https://marvel.fandom.com/a").unwrap()), "marvel.fandom.com");
    }
}
