// src/utils/url.rs

//! URL manipulation utilities.

use std::sync::OnceLock;

use regex::Regex;

/// Prefix `https://` when a link has no scheme.
///
/// # Examples
/// ```
/// use course_monitor::utils::url::ensure_scheme;
///
/// assert_eq!(ensure_scheme("example.com/a.pdf"), "https://example.com/a.pdf");
/// assert_eq!(ensure_scheme("http://example.com"), "http://example.com");
/// ```
pub fn ensure_scheme(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{url}")
    }
}

/// Resolve a link found inside a fetched page against that page's URL.
///
/// Absolute links are returned unchanged; relative links are joined.
pub fn resolve(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => ensure_scheme(href),
    }
}

/// Extract the target of a scripted `window.open('...')` action.
pub fn window_open_target(onclick: &str) -> Option<String> {
    static WINDOW_OPEN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = WINDOW_OPEN
        .get_or_init(|| Regex::new(r"window\.open\('([^']+)'").ok())
        .as_ref()?;
    re.captures(onclick)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract a file identifier from an external drive link.
///
/// Understands `/file/d/<id>/...` paths and `id=<id>` query parameters.
pub fn drive_file_id(url: &str) -> Option<String> {
    if let Some((_, rest)) = url.split_once("/file/d/") {
        let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
        return (!id.is_empty()).then(|| id.to_string());
    }

    if let Ok(parsed) = url::Url::parse(url) {
        return parsed
            .query_pairs()
            .find(|(key, value)| key == "id" && !value.is_empty())
            .map(|(_, value)| value.into_owned());
    }

    let (_, rest) = url.split_once("id=")?;
    let id = rest.split(['&', '#']).next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

/// Rewrite a drive link into the provider's direct-download form.
pub fn drive_download_url(url: &str, template: &str) -> Option<String> {
    drive_file_id(url).map(|id| template.replace("{id}", &id))
}
