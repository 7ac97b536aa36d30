// src/services/session.rs

//! Authenticated portal session.
//!
//! One HTTP client and one cookie jar per engine. Expired sessions are
//! detected from page content and repaired with a single re-login.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use reqwest::{Client, Response};
use scraper::Html;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::cookies::SessionCookies;
use crate::storage::LocalStorage;
use crate::utils::http::{content_type, create_session_client, is_html};
use crate::utils::url::{drive_download_url, resolve};
use crate::utils::{first_link, parse_selector};

/// A downloaded file in the scratch directory.
///
/// The file is removed when the artifact is dropped.
#[derive(Debug)]
pub struct DownloadedArtifact {
    path: TempPath,
    size: u64,
}

impl DownloadedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&*self.path).await?)
    }
}

/// A fetched page together with the URL it finally came from.
struct Page {
    url: String,
    body: String,
}

/// Session with the e-learning portal.
pub struct AuthSession {
    config: Arc<Config>,
    storage: LocalStorage,
    cookies: Arc<SessionCookies>,
    client: Client,
}

impl AuthSession {
    /// Create a session, resuming cookies persisted by a previous run.
    pub async fn open(config: Arc<Config>, storage: LocalStorage) -> Result<Self> {
        let cookies = Arc::new(SessionCookies::load(&storage).await);
        let client = create_session_client(&config.portal, Arc::clone(&cookies))?;
        Ok(Self {
            config,
            storage,
            cookies,
            client,
        })
    }

    /// Client carrying the session cookies.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Fetch a page as the logged-in user.
    ///
    /// An expired session triggers exactly one login and one retry.
    pub async fn fetch_authenticated(&self, url: &str) -> Result<String> {
        let page = self.fetch_page(url).await?;
        if !self.is_expired(&page) {
            return Ok(page.body);
        }

        log::info!("Session expired, logging in again");
        self.login().await?;

        let page = self.fetch_page(url).await?;
        if self.is_expired(&page) {
            return Err(AppError::auth(format!(
                "session still rejected after login for {url}"
            )));
        }
        Ok(page.body)
    }

    /// Log in with the configured credentials and persist the new cookies.
    pub async fn login(&self) -> Result<()> {
        let portal = &self.config.portal;
        let credentials = &self.config.credentials;

        let login_page = self
            .client
            .get(&portal.login_url)
            .send()
            .await
            .map_err(|e| AppError::auth(format!("login page unreachable: {e}")))?;
        let html = login_page
            .text()
            .await
            .map_err(|e| AppError::auth(format!("login page unreadable: {e}")))?;

        let mut form = hidden_fields(&html)?;
        form.retain(|(name, _)| name != "username" && name != "password");
        form.push(("username".to_string(), credentials.username.clone()));
        form.push(("password".to_string(), credentials.password.clone()));

        let response = self
            .client
            .post(&portal.login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::auth(format!("login request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::auth(format!("login returned {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| AppError::auth(format!("login response unreadable: {e}")))?;

        if portal
            .login_failure_markers
            .iter()
            .any(|marker| body.contains(marker.as_str()))
        {
            log::error!("Login failed: portal rejected the credentials");
            return Err(AppError::auth("portal rejected the credentials"));
        }

        if let Err(e) = self.save_cookies().await {
            log::warn!("Could not persist session cookies: {}", e);
        }
        log::info!("Login successful");
        Ok(())
    }

    /// Download a resource into the scratch directory.
    ///
    /// Drive links are rewritten to their direct-download form and portal
    /// wrapper pages are followed one hop through their first link.
    pub async fn download(&self, url: &str) -> Result<DownloadedArtifact> {
        let rules = &self.config.classifier;

        let target = if rules.is_drive(url) {
            drive_download_url(url, &rules.drive_download_template)
                .ok_or_else(|| AppError::download(url, "no file id in drive link"))?
        } else {
            url.to_string()
        };

        let mut response = self.get_ok(&target).await?;

        if rules.is_wrapper(url) && is_html(content_type(&response).as_deref()) {
            let base = response.url().to_string();
            let body = response
                .text()
                .await
                .map_err(|e| AppError::download(url, e))?;
            let href = first_anchor(&body)
                .ok_or_else(|| AppError::download(url, "wrapper page has no link"))?;
            let next = resolve(&base, &href);
            log::debug!("Following wrapper {} -> {}", url, next);
            response = self.get_ok(&next).await?;
        }

        self.write_artifact(url, response).await
    }

    pub async fn save_cookies(&self) -> Result<()> {
        self.cookies.save(&self.storage).await
    }

    async fn fetch_page(&self, url: &str) -> Result<Page> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("status {status}")));
        }
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;
        Ok(Page {
            url: final_url,
            body,
        })
    }

    async fn get_ok(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::download(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::download(url, format!("status {status}")));
        }
        Ok(response)
    }

    async fn write_artifact(&self, url: &str, response: Response) -> Result<DownloadedArtifact> {
        let dir = self.config.paths.download_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let (file, path) = tempfile::Builder::new()
            .prefix("artifact-")
            .suffix(".part")
            .tempfile_in(&dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut size = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| AppError::download(url, e))?;
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        if size == 0 {
            log::error!("Download produced an empty file: {}", url);
            return Err(AppError::download(url, "empty artifact"));
        }

        log::debug!("Downloaded {} bytes from {}", size, url);
        Ok(DownloadedArtifact { path, size })
    }

    fn is_expired(&self, page: &Page) -> bool {
        let portal = &self.config.portal;
        same_page(&page.url, &portal.login_url)
            || portal
                .session_expired_markers
                .iter()
                .any(|marker| page.body.contains(marker.as_str()))
    }
}

/// Named hidden inputs of the login form, in document order.
fn hidden_fields(html: &str) -> Result<Vec<(String, String)>> {
    let selector = parse_selector(r#"form input[type="hidden"]"#)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect())
}

fn first_anchor(html: &str) -> Option<String> {
    first_link(&Html::parse_document(html))
}

/// Whether two URLs name the same page, ignoring query and fragment.
fn same_page(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a.host_str() == b.host_str() && a.path() == b.path(),
        _ => false,
    }
}
