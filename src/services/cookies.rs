//! Persistent cookie store for the portal session.
//!
//! Cookies are kept as `{name, value, domain}` triples so the session can be
//! saved to `cookies.json` and resumed by the next invocation.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{COOKIES_DOCUMENT, DocumentStorage, load_document, save_document};

/// One persisted cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl StoredCookie {
    fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        host.eq_ignore_ascii_case(domain)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
    }
}

/// Cookie jar shared by every request of one session.
#[derive(Debug, Default)]
pub struct SessionCookies {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl SessionCookies {
    pub fn new(cookies: Vec<StoredCookie>) -> Self {
        Self {
            cookies: RwLock::new(cookies),
        }
    }

    /// Load the persisted jar; missing or broken documents yield an empty jar.
    pub async fn load(storage: &dyn DocumentStorage) -> Self {
        let cookies: Vec<StoredCookie> = load_document(storage, COOKIES_DOCUMENT).await;
        log::debug!("Loaded {} session cookies", cookies.len());
        Self::new(cookies)
    }

    pub async fn save(&self, storage: &dyn DocumentStorage) -> Result<()> {
        save_document(storage, COOKIES_DOCUMENT, &self.snapshot()).await
    }

    /// Copy of the current cookies.
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(&self, header: &str, host: &str) {
        let Some(update) = parse_set_cookie(header, host) else {
            return;
        };
        let mut cookies = self
            .cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let (cookie, expired) = update;
        cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
        if !expired {
            cookies.push(cookie);
        }
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        for header in cookie_headers {
            if let Ok(header) = header.to_str() {
                self.apply(header, host);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let host = url.host_str()?;
        let header = self
            .cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.matches_host(host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

/// Parse a `Set-Cookie` header into a cookie and whether it deletes one.
///
/// Only name, value, domain and expiry are kept, matching the persisted
/// `[{name, value, domain}]` form. `Path` and `Secure` are ignored, so a
/// cookie is sent to every path of its domain over any scheme.
fn parse_set_cookie(header: &str, host: &str) -> Option<(StoredCookie, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut domain = host.to_string();
    let mut expired = value.is_empty() || value == "deleted";
    for attr in parts {
        let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
        let val = val.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => domain = val.trim_start_matches('.').to_string(),
            "max-age" => expired |= val.parse::<i64>().is_ok_and(|age| age <= 0),
            "expires" => expired |= parse_expires(val).is_some_and(|at| at <= Utc::now()),
            _ => {}
        }
    }

    Some((
        StoredCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain,
        },
        expired,
    ))
}

/// `Expires` in RFC 1123 (`Thu, 01 Jan 1970 ...`), the dashed Netscape
/// form (`Thu, 01-Jan-1970 ...`) or RFC 850 (`Thursday, 01-Jan-70 ...`).
fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%A, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|at| at.and_utc())
}
