// src/services/monitor.rs

//! Change monitor.
//!
//! Fetches a module page, extracts resource and link activities in page
//! order, and classifies the ones not yet delivered to the module's
//! destination.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{ElementRef, Html};

use crate::error::Result;
use crate::models::{Candidate, Config, Module, NodeShape, ResourceDescriptor};
use crate::services::classifier::ResourceClassifier;
use crate::services::session::AuthSession;
use crate::storage::DeliveryLedger;
use crate::utils::parse_selector;
use crate::utils::url::{ensure_scheme, resolve, window_open_target};
use crate::utils::visible_text;

const ACTIVITY_SELECTOR: &str =
    "li.activity.resource.modtype_resource, li.activity.url.modtype_url";
const LINK_SELECTOR: &str = "div.activityinstance a";
const NAME_SELECTOR: &str = "span.instancename";
const HIDDEN_CLASS: &str = "accesshide";
const UNNAMED: &str = "Unnamed resource";

/// Finds undelivered resources on module pages.
pub struct ChangeMonitor {
    classifier: ResourceClassifier,
}

impl ChangeMonitor {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            classifier: ResourceClassifier::new(config),
        }
    }

    /// Newly discovered resources for `module`, in page order.
    ///
    /// Only a failure to fetch the page is an error; links that cannot be
    /// classified are skipped.
    pub async fn check_module(
        &self,
        session: &AuthSession,
        module: &Module,
        ledger: &DeliveryLedger,
    ) -> Result<Vec<ResourceDescriptor>> {
        let html = session.fetch_authenticated(&module.url).await?;
        let candidates = parse_candidates(&html, &module.url)?;

        let unseen: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !ledger.contains(&module.id, &module.destination, &c.url))
            .collect();
        log::debug!(
            "Module {} ({}): {} unseen candidates",
            module.id,
            module.name,
            unseen.len()
        );

        let mut found = Vec::new();
        for candidate in &unseen {
            if let Some(descriptor) = self.classifier.classify(session.client(), candidate).await {
                found.push(descriptor);
            }
        }

        log::info!(
            "Module {} ({}): {} new resources",
            module.id,
            module.name,
            found.len()
        );
        Ok(found)
    }
}

/// Extract resource candidates from a module page, de-duplicated by URL.
///
/// Nodes without a usable link are skipped.
pub fn parse_candidates(html: &str, page_url: &str) -> Result<Vec<Candidate>> {
    let activities = parse_selector(ACTIVITY_SELECTOR)?;
    let links = parse_selector(LINK_SELECTOR)?;
    let names = parse_selector(NAME_SELECTOR)?;

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for activity in document.select(&activities) {
        let Some(link) = activity.select(&links).next() else {
            continue;
        };
        let Some(href) = link_target(link) else {
            log::debug!("Skipping activity without a link");
            continue;
        };

        let url = normalize_link(page_url, &href);
        if !seen.insert(url.clone()) {
            continue;
        }

        let name = link
            .select(&names)
            .next()
            .map(|el| visible_text(el, HIDDEN_CLASS))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNNAMED.to_string());

        candidates.push(Candidate {
            url,
            name,
            shape: node_shape(activity),
        });
    }

    Ok(candidates)
}

/// The link's href, or the target of its scripted popup when href is empty.
fn link_target(link: ElementRef<'_>) -> Option<String> {
    let href = link.value().attr("href").map(str::trim).unwrap_or_default();
    if !href.is_empty() {
        return Some(href.to_string());
    }
    link.value().attr("onclick").and_then(window_open_target)
}

fn normalize_link(page_url: &str, href: &str) -> String {
    if href.starts_with('/') && !href.starts_with("//") {
        resolve(page_url, href)
    } else {
        ensure_scheme(href)
    }
}

fn node_shape(activity: ElementRef<'_>) -> NodeShape {
    if activity.value().classes().any(|c| c == "modtype_url") {
        NodeShape::Link
    } else {
        NodeShape::Resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <ul class="section">
          <li class="activity url modtype_url" id="module-11">
            <div class="activityinstance">
              <a href="https://x/mod/url/view.php?id=11">
                <span class="instancename">Lecture video<span class="accesshide "> URL</span></span>
              </a>
            </div>
          </li>
          <li class="activity forum modtype_forum">
            <div class="activityinstance"><a href="https://x/mod/forum/view.php?id=1">News</a></div>
          </li>
          <li class="activity resource modtype_resource" id="module-5">
            <div class="activityinstance">
              <a href="" onclick="window.open('https://x/mod/resource/view.php?id=5&amp;redirect=1', '', 'width=620'); return false;">
                <span class="instancename">Chapitre 1<span class="accesshide "> Fichier</span></span>
              </a>
            </div>
          </li>
          <li class="activity resource modtype_resource">
            <div class="activityinstance"><a href=""><span class="instancename">Broken</span></a></div>
          </li>
          <li class="activity resource modtype_resource">
            <div class="activityinstance">
              <a href="x/mod/resource/view.php?id=6"><span class="instancename"></span></a>
            </div>
          </li>
          <li class="activity url modtype_url">
            <div class="activityinstance">
              <a href="https://x/mod/url/view.php?id=11"><span class="instancename">Duplicate</span></a>
            </div>
          </li>
        </ul>"#;

    #[test]
    fn test_parse_candidates_in_page_order() {
        let candidates = parse_candidates(PAGE, "https://x/course/view.php?id=1").unwrap();
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://x/mod/url/view.php?id=11",
                "https://x/mod/resource/view.php?id=5&redirect=1",
                "https://x/mod/resource/view.php?id=6",
            ]
        );
    }

    #[test]
    fn test_parse_candidates_names_and_shapes() {
        let candidates = parse_candidates(PAGE, "https://x/course/view.php?id=1").unwrap();
        assert_eq!(candidates[0].name, "Lecture video");
        assert_eq!(candidates[0].shape, NodeShape::Link);
        assert_eq!(candidates[1].name, "Chapitre 1");
        assert_eq!(candidates[1].shape, NodeShape::Resource);
        assert_eq!(candidates[2].name, UNNAMED);
    }

    #[test]
    fn test_root_relative_links_resolve_against_page() {
        let html = r#"<li class="activity resource modtype_resource">
            <div class="activityinstance"><a href="/mod/resource/view.php?id=8">
            <span class="instancename">TD</span></a></div></li>"#;
        let candidates = parse_candidates(html, "https://x/course/view.php?id=1").unwrap();
        assert_eq!(candidates[0].url, "https://x/mod/resource/view.php?id=8");
    }

    #[test]
    fn test_page_without_activities() {
        assert!(parse_candidates("<html></html>", "https://x/").unwrap().is_empty());
    }
}
