//! Content extraction from loaded pages
//!
//! The extractor is the only code that touches raw HTML. It pulls anchors
//! (with the structural context the classifier scores on) and embedded
//! object references out of a [`PageHandle`] and hands back an
//! [`ElementSet`]; everything downstream works on that model.

use scraper::{ElementRef, Html, Selector};

use crate::classify::{ElementSet, EmbedRef, PageLink};

/// One loaded page: the address it was loaded from and its body
#[derive(Debug, Clone)]
pub struct PageHandle {
    /// Normalized target the body was fetched from
    pub target: String,
    pub body: String,
}

/// Extracts classifier input from a loaded page
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, page: &PageHandle) -> ElementSet;
}

/// The production extractor, built on an HTML parse of the page body
#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, page: &PageHandle) -> ElementSet {
        let document = Html::parse_document(&page.body);
        ElementSet {
            page: page.target.clone(),
            links: extract_links(&document),
            embeds: extract_embeds(&document),
        }
    }
}

fn extract_links(document: &Html) -> Vec<PageLink> {
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            links.push(PageLink {
                href: href.to_string(),
                text: collapse_text(element),
                class_attr: nonempty_attr(element, "class"),
                container: enclosing_container(element),
                item_id: numeric_attr(element, "data-id")
                    .or_else(|| numeric_attr(element, "data-item-id")),
                content_kind: nonempty_attr(element, "data-content-type")
                    .or_else(|| nonempty_attr(element, "type")),
                download_attr: element.value().attr("download").is_some(),
            });
        }
    }

    links
}

fn extract_embeds(document: &Html) -> Vec<EmbedRef> {
    let mut embeds = Vec::new();

    for (css, attr) in [("iframe[src]", "src"), ("embed[src]", "src"), ("object[data]", "data")] {
        if let Ok(selector) = Selector::parse(css) {
            for element in document.select(&selector) {
                if let Some(src) = element.value().attr(attr) {
                    embeds.push(EmbedRef {
                        src: src.to_string(),
                        title: nonempty_attr(element, "title"),
                    });
                }
            }
        }
    }

    embeds
}

/// Collects the element's text with whitespace collapsed to single spaces
fn collapse_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The id of the nearest ancestor element that carries one
fn enclosing_container(element: ElementRef) -> Option<String> {
    for ancestor in element.ancestors() {
        if let Some(parent) = ElementRef::wrap(ancestor) {
            if let Some(id) = parent.value().attr("id") {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }
    }
    None
}

fn nonempty_attr(element: ElementRef, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn numeric_attr(element: ElementRef, name: &str) -> Option<u64> {
    element.value().attr(name).and_then(|v| v.trim().parse().ok())
}
