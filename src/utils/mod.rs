//! Utility functions and helpers.

pub mod http;
pub mod text;
pub mod url;

use scraper::{ElementRef, Selector};

use crate::error::{AppError, Result};

/// Parse a CSS selector, reporting the offending text on failure.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Href of the first anchor with a non-empty target.
pub fn first_link(document: &scraper::Html) -> Option<String> {
    let anchors = parse_selector("a[href]").ok()?;
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

/// Text content of an element, skipping anything inside elements with `hidden_class`.
pub fn visible_text(element: ElementRef<'_>, hidden_class: &str) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != element.id())
            .filter_map(ElementRef::wrap)
            .any(|el| el.value().classes().any(|c| c == hidden_class));
        if !hidden {
            text.push_str(fragment);
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
