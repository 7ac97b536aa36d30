// src/services/classifier.rs

//! Resource classification.
//!
//! Many portal downloads sit behind an intermediate view page, so a link is
//! classified in two tiers: the direct response first, then the first link
//! of the returned HTML page.

use std::sync::Arc;

use reqwest::Client;
use scraper::Html;

use crate::models::{Candidate, ClassifierConfig, Config, ResourceDescriptor, ResourceKind};
use crate::utils::first_link;
use crate::utils::http::{content_type, is_html};
use crate::utils::url::{ensure_scheme, resolve};

const UNNAMED: &str = "Unnamed resource";

/// Decides what a candidate link points at.
pub struct ResourceClassifier {
    config: Arc<Config>,
}

impl ResourceClassifier {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Classify a candidate with one GET (redirects followed).
    ///
    /// Returns `None` for anything that is not deliverable, including
    /// unreachable links.
    pub async fn classify(
        &self,
        client: &Client,
        candidate: &Candidate,
    ) -> Option<ResourceDescriptor> {
        let rules = &self.config.classifier;
        let source_url = ensure_scheme(&candidate.url);
        let name = self.display_name(&candidate.name);

        let response = match client.get(&source_url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Could not classify {}: {}", source_url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            log::warn!(
                "Could not classify {}: status {}",
                source_url,
                response.status()
            );
            return None;
        }

        let content_type = content_type(&response);
        let final_url = response.url().to_string();

        let (kind, final_url) = if is_direct_document(rules, content_type.as_deref(), &final_url)
        {
            (ResourceKind::Document, final_url)
        } else if is_html(content_type.as_deref()) {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    log::warn!("Could not read {}: {}", final_url, e);
                    return None;
                }
            };
            classify_page(rules, &final_url, &body)?
        } else {
            log::debug!(
                "Skipping {} ({})",
                source_url,
                content_type.as_deref().unwrap_or("no content type")
            );
            return None;
        };

        log::debug!(
            "Classified '{}' ({:?} activity) as {}: {}",
            name,
            candidate.shape,
            kind,
            final_url
        );
        Some(ResourceDescriptor {
            source_url,
            final_url,
            name,
            kind,
        })
    }

    fn display_name(&self, raw: &str) -> String {
        let name = self.config.cleaning.clean_name(raw);
        if name.is_empty() {
            UNNAMED.to_string()
        } else {
            name
        }
    }
}

/// The response itself is the document.
pub fn is_direct_document(
    rules: &ClassifierConfig,
    content_type: Option<&str>,
    final_url: &str,
) -> bool {
    content_type.is_some_and(|ct| rules.is_document_type(ct))
        || rules.has_document_extension(final_url)
}

/// Classify an intermediate HTML page by its first link.
///
/// Drive links win over document links, which win over video links.
pub fn classify_page(
    rules: &ClassifierConfig,
    page_url: &str,
    html: &str,
) -> Option<(ResourceKind, String)> {
    let href = first_link(&Html::parse_document(html))?;
    let target = resolve(page_url, &href);

    if rules.is_drive(&target) {
        Some((ResourceKind::ExternalDrive, target))
    } else if rules.has_document_extension(&target) {
        Some((ResourceKind::Document, target))
    } else if rules.is_video(&target) {
        Some((ResourceKind::Video, target))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ClassifierConfig {
        ClassifierConfig::default()
    }

    #[test]
    fn test_direct_document_by_type_or_path() {
        let rules = rules();
        assert!(is_direct_document(&rules, Some("application/pdf"), "https://x/view.php?id=5"));
        assert!(is_direct_document(&rules, None, "https://x/pluginfile.php/3/td.pdf"));
        assert!(!is_direct_document(&rules, Some("text/html"), "https://x/view.php?id=5"));
    }

    #[test]
    fn test_page_with_drive_link() {
        let html = r#"<div class="urlworkaround">Click
            <a href="https://drive.google.com/file/d/ABC123/view?usp=sharing">here</a></div>"#;
        let (kind, target) = classify_page(&rules(), "https://x/mod/url/view.php?id=9", html).unwrap();
        assert_eq!(kind, ResourceKind::ExternalDrive);
        assert!(target.contains("ABC123"));
    }

    #[test]
    fn test_page_with_relative_document_link() {
        let html = r#"<a href="/pluginfile.php/12/mod_resource/content/1/Cours.pdf">Cours.pdf</a>"#;
        assert_eq!(
            classify_page(&rules(), "https://x/mod/resource/view.php?id=4", html),
            Some((
                ResourceKind::Document,
                "https://x/pluginfile.php/12/mod_resource/content/1/Cours.pdf".to_string()
            ))
        );
    }

    #[test]
    fn test_page_with_video_link() {
        let html = r#"<a href="https://youtu.be/dQw4w9WgXcQ">watch</a>"#;
        let (kind, _) = classify_page(&rules(), "https://x/mod/url/view.php?id=2", html).unwrap();
        assert_eq!(kind, ResourceKind::Video);
    }

    #[test]
    fn test_only_first_link_counts() {
        let html = r#"<a href="https://x/help.html">help</a>
            <a href="https://drive.google.com/file/d/ABC/view">file</a>"#;
        assert_eq!(classify_page(&rules(), "https://x/", html), None);
    }

    #[test]
    fn test_page_without_links() {
        assert_eq!(classify_page(&rules(), "https://x/", "<p>nothing</p>"), None);
    }
}
