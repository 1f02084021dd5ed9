//! Listing-page extraction rules, one per [`ListingKind`]

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::types::ListingKind;

/// CMS article cards
const ARTICLE_SELECTOR: &str = "div#elCmsPageWrap article";
/// Download listing rows
const DOCUMENT_SELECTOR: &str = "ol.ipsDataList li.ipsDataItem";
/// Forum question rows
const QUESTION_SELECTOR: &str = "li.cForumQuestion";

/// First absolute URL inside an inline style (`background-image: url("...")`)
static STYLE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'()]+"#).ok());

/// Metadata of one item as shown on a listing page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingItem {
    /// Item title (title anchor text)
    pub title: String,
    /// Absolute detail-page URL, also the item's source id
    pub url: String,
    /// Short description shown on the listing
    pub description: Option<String>,
    /// Remote thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Author name shown next to the title
    pub author: Option<String>,
}

/// Extract the items of one listing page
///
/// Items whose title anchor is missing are skipped; a page with no
/// recognizable items yields an empty list.
pub fn parse_listing(kind: ListingKind, document: &Html, base: &Url) -> Vec<ListingItem> {
    let items = match kind {
        ListingKind::Article => select_items(document, ARTICLE_SELECTOR, |item| parse_article(item, base)),
        ListingKind::Document => select_items(document, DOCUMENT_SELECTOR, |item| parse_document(item, base)),
        ListingKind::Question => select_items(document, QUESTION_SELECTOR, |item| parse_question(item, base)),
    };
    tracing::trace!(kind = kind.as_str(), items = items.len(), "Parsed listing page");
    items
}

fn select_items<F>(document: &Html, selector: &str, parse: F) -> Vec<ListingItem>
where
    F: Fn(ElementRef<'_>) -> Option<ListingItem>,
{
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document.select(&selector).filter_map(parse).collect()
}

fn parse_article(item: ElementRef<'_>, base: &Url) -> Option<ListingItem> {
    let title = title_anchor(item, "h2")?;
    let thumbnail_url = first(item, "img")
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| absolute(src, base));
    let description = first(item, "section").map(text_of);

    Some(ListingItem {
        title: text_of(title),
        url: absolute(title.value().attr("href")?, base)?,
        description,
        thumbnail_url,
        author: following(item, title, "a").map(text_of),
    })
}

fn parse_document(item: ElementRef<'_>, base: &Url) -> Option<ListingItem> {
    let divs = all(item, "div");
    let thumbnail_url = divs
        .first()
        .and_then(|div| first(*div, "a"))
        .and_then(|a| a.value().attr("style"))
        .and_then(style_url);
    let title = title_anchor(*divs.get(1)?, "h4")?;

    Some(ListingItem {
        title: text_of(title),
        url: absolute(title.value().attr("href")?, base)?,
        description: following(item, title, "div").map(text_of),
        thumbnail_url,
        author: following(item, title, "a").map(text_of),
    })
}

fn parse_question(item: ElementRef<'_>, base: &Url) -> Option<ListingItem> {
    let divs = all(item, "div");
    let title = title_anchor(*divs.get(1)?, "h4")?;

    Some(ListingItem {
        title: text_of(title),
        url: absolute(title.value().attr("href")?, base)?,
        description: None,
        thumbnail_url: None,
        author: following(item, title, "a").map(text_of),
    })
}

/// First anchor inside a `heading` element that is not a tag link
fn title_anchor<'a>(scope: ElementRef<'a>, heading: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(&format!("{heading} a")).ok()?;
    scope.select(&selector).find(|a| {
        a.value()
            .attr("href")
            .is_some_and(|href| !href.contains("/tags/"))
    })
}

fn first<'a>(scope: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(name).ok()?;
    scope.select(&selector).next()
}

fn all<'a>(scope: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(name) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// First `name` element after `marker` in document order, outside `marker`
pub(crate) fn following<'a>(scope: ElementRef<'a>, marker: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    scope
        .descendants()
        .skip_while(|node| node.id() != marker.id())
        .skip(1)
        .filter(|node| !node.ancestors().any(|a| a.id() == marker.id()))
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == name)
}

pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn absolute(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href == "#" {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

fn style_url(style: &str) -> Option<String> {
    STYLE_URL
        .as_ref()?
        .find(style)
        .map(|m| m.as_str().replace('"', ""))
}
