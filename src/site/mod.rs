//! Site navigation model
//!
//! The harvested site has a fixed shape: a navigation bar with a known set
//! of categories, each opening a menu of topic listings. Categories are
//! located by their exact anchor text; topics are read from the menu that
//! follows the anchor. Per-kind listing rules live in [`listing`].

pub mod listing;

pub use listing::{ListingItem, parse_listing};

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::CategoryConfig;
use crate::error::{Error, Result};
use crate::fetcher::HttpFetcher;
use listing::{absolute, following, text_of};

/// Navigation bar holding the category anchors
const NAV_BAR_SELECTOR: &str = r#"ul[data-role="primaryNavBar"]"#;

/// One topic listing under a category
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicLink {
    /// Anchor text
    pub title: String,
    /// Absolute listing URL
    pub url: String,
}

/// A category with the topics found in its navigation menu
#[derive(Clone, Debug)]
pub struct Category {
    /// Configured category
    pub config: CategoryConfig,
    /// Topics in menu order
    pub topics: Vec<TopicLink>,
}

/// Fetch the home page and locate every configured category
///
/// # Errors
///
/// Returns error if the home page cannot be fetched or has no navigation
/// bar. A single category whose anchor is missing is logged and left out.
pub async fn discover_categories(
    fetcher: &HttpFetcher,
    base: &Url,
    categories: &[CategoryConfig],
) -> Result<Vec<Category>> {
    let page = fetcher.fetch_page(base.as_str()).await?;
    parse_categories(&page.html(), base, categories)
}

/// Locate the configured categories in a parsed home page
pub fn parse_categories(document: &Html, base: &Url, categories: &[CategoryConfig]) -> Result<Vec<Category>> {
    let nav_selector = Selector::parse(NAV_BAR_SELECTOR).map_err(|e| Error::Other(e.to_string()))?;
    let nav = document
        .select(&nav_selector)
        .next()
        .ok_or_else(|| Error::missing(NAV_BAR_SELECTOR, base.as_str()))?;

    let mut found = Vec::with_capacity(categories.len());
    for category in categories {
        match locate_topics(nav, &category.anchor_text, base) {
            Some(topics) => {
                tracing::info!(
                    category = %category.name,
                    kind = category.kind.as_str(),
                    topics = topics.len(),
                    "Discovered category"
                );
                found.push(Category {
                    config: category.clone(),
                    topics,
                });
            }
            None => {
                tracing::warn!(
                    category = %category.name,
                    anchor_text = %category.anchor_text,
                    "Category anchor not found in navigation, skipping"
                );
            }
        }
    }
    Ok(found)
}

fn locate_topics(nav: ElementRef<'_>, anchor_text: &str, base: &Url) -> Option<Vec<TopicLink>> {
    let anchors = Selector::parse("a").ok()?;
    let anchor = nav.select(&anchors).find(|a| text_of(*a) == anchor_text)?;
    let menu = following(nav, anchor, "ul")?;

    let mut topics: Vec<TopicLink> = Vec::new();
    for link in menu.select(&anchors) {
        // "#" links open sub-menus and have no listing behind them
        let Some(url) = link.value().attr("href").and_then(|href| absolute(href, base)) else {
            continue;
        };
        if !topics.iter().any(|t| t.url == url) {
            topics.push(TopicLink {
                title: text_of(link),
                url,
            });
        }
    }
    Some(topics)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    fn base() -> Url {
        Url::parse("https://academy.example.com/").unwrap()
    }

    fn home() -> Html {
        Html::parse_document(
            r##"<nav><ul data-role="primaryNavBar">
                <li><a href="/articles/">دروس ومقالات</a>
                    <ul>
                        <li><a href="/programming/">برمجة</a></li>
                        <li><a href="#">المزيد</a></li>
                        <li><a href="https://academy.example.com/design/">تصميم</a></li>
                    </ul>
                </li>
                <li><a href="/questions/">أسئلة وأجوبة</a>
                    <ul><li><a href="/questions/programming/">أسئلة البرمجة</a></li></ul>
                </li>
            </ul></nav>"##,
        )
    }

    #[test]
    fn topics_follow_the_category_anchor() {
        let categories = parse_categories(&home(), &base(), &SiteConfig::default().categories).unwrap();

        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].config.anchor_text, "دروس ومقالات");
        assert_eq!(
            categories[0].topics,
            vec![
                TopicLink {
                    title: "برمجة".into(),
                    url: "https://academy.example.com/programming/".into()
                },
                TopicLink {
                    title: "تصميم".into(),
                    url: "https://academy.example.com/design/".into()
                },
            ]
        );
        assert_eq!(categories[1].topics.len(), 1);
    }

    #[test]
    fn missing_navigation_is_a_content_error() {
        let document = Html::parse_document("<html><body></body></html>");
        let err = parse_categories(&document, &base(), &SiteConfig::default().categories).unwrap_err();
        assert_eq!(err.failure_kind(), crate::error::FailureKind::ContentShape);
    }
}
