//! Removal of interactive markup
//!
//! Cleaning runs before localization so that no asset reference survives
//! only inside markup that is about to be removed.

use dom_query::Document;

/// What happens to anchors in a cleaned fragment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Text-only anchors become their text; other anchors lose `href`
    Unwrap,
    /// Every anchor loses `href`, markup is kept
    Inert,
}

/// Remove scripts and iframes, then apply the link policy
pub fn clean(document: &Document, policy: LinkPolicy) {
    document.select("script").remove();
    document.select("iframe").remove();

    match policy {
        LinkPolicy::Unwrap => {
            for anchor in document.select("a").iter() {
                if anchor.children().is_empty() {
                    let text = anchor.text();
                    let escaped = html_escape::encode_text(&*text).into_owned();
                    anchor.replace_with_html(escaped);
                } else {
                    anchor.remove_attr("href");
                }
            }
        }
        LinkPolicy::Inert => {
            document.select("a[href]").remove_attr("href");
        }
    }
}
